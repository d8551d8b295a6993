//! Configuration validation functions.

use super::Config;

/// Whether the process is running in production mode (`PAIRLINK_ENV=production`).
pub fn is_production_mode() -> bool {
    std::env::var("PAIRLINK_ENV")
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

/// Validate configuration consistency. Returns a combined, human-readable
/// error listing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut problems = Vec::new();

    if config.port == 0 {
        problems.push("port must be non-zero".to_string());
    }

    for (name, weight) in [
        ("matching.interest_weight", config.matching.interest_weight),
        ("matching.demographic_weight", config.matching.demographic_weight),
        ("matching.chat_mode_weight", config.matching.chat_mode_weight),
        ("matching.behavior_weight", config.matching.behavior_weight),
    ] {
        if !(0.0..=1.0).contains(&weight) {
            problems.push(format!("{name} must be within [0, 1], got {weight}"));
        }
    }

    for (name, threshold) in [
        ("matching.video_threshold", config.matching.video_threshold),
        ("matching.text_threshold", config.matching.text_threshold),
    ] {
        if !(0.0..=100.0).contains(&threshold) {
            problems.push(format!("{name} must be within [0, 100], got {threshold}"));
        }
    }

    if config.matching.optimal_age_diff >= config.matching.max_age_diff {
        problems.push(format!(
            "matching.optimal_age_diff ({}) must be below matching.max_age_diff ({})",
            config.matching.optimal_age_diff, config.matching.max_age_diff
        ));
    }

    if config.matching.wait_boost_floor_secs >= config.matching.priority_time_secs {
        problems.push(format!(
            "matching.wait_boost_floor_secs ({}) must be below matching.priority_time_secs ({})",
            config.matching.wait_boost_floor_secs, config.matching.priority_time_secs
        ));
    }

    if config.server.rematch_interval_secs == 0 {
        problems.push("server.rematch_interval_secs must be non-zero".to_string());
    }

    if config.server.max_wait_time_secs == 0 {
        problems.push("server.max_wait_time_secs must be non-zero".to_string());
    }

    if config.security.max_message_size == 0 {
        problems.push("security.max_message_size must be non-zero".to_string());
    }

    if is_production_mode() && config.security.cors_origins == "*" {
        problems.push(
            "security.cors_origins is permissive (`*`) in production mode; \
             set an explicit origin allowlist"
                .to_string(),
        );
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_out_of_range_weight() {
        let mut config = Config::default();
        config.matching.interest_weight = 1.5;
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("interest_weight"));
    }

    #[test]
    fn rejects_inverted_age_diffs() {
        let mut config = Config::default();
        config.matching.optimal_age_diff = 30;
        config.matching.max_age_diff = 25;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn collects_multiple_problems() {
        let mut config = Config::default();
        config.port = 0;
        config.matching.video_threshold = 250.0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("port"));
        assert!(err.contains("video_threshold"));
    }
}
