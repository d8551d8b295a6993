//! Configuration loading.

use config::{ConfigError, Environment, File};

use super::Config;

/// Load configuration, later sources overriding earlier ones:
/// 1. Defaults compiled into the binary (serde defaults)
/// 2. `config.json` in the current working directory, if present
/// 3. The file named by `PAIRLINK_CONFIG_PATH`, if set
/// 4. `PAIRLINK__`-prefixed environment variables with `__` as the nesting
///    separator, e.g. `PAIRLINK__PORT=8080` or
///    `PAIRLINK__MATCHING__TEXT_THRESHOLD=60`
///
/// A `.env` file in the working directory is read into the environment
/// first, so local development overrides live next to the checkout.
///
/// Validation is the caller's job: main runs
/// [`validate_config`](super::validation::validate_config) on the result so
/// `--validate-config` gets a proper exit code.
pub fn load() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();

    let mut builder =
        config::Config::builder().add_source(File::with_name("config").required(false));

    if let Ok(path) = std::env::var("PAIRLINK_CONFIG_PATH") {
        builder = builder.add_source(File::with_name(&path));
    }

    builder
        .add_source(
            Environment::with_prefix("PAIRLINK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sources_yield_compiled_defaults() {
        let cfg: Config = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let defaults = Config::default();
        assert_eq!(cfg.port, defaults.port);
        assert_eq!(cfg.matching.text_threshold, defaults.matching.text_threshold);
        assert_eq!(
            cfg.server.inactive_threshold_secs,
            defaults.server.inactive_threshold_secs
        );
    }

    #[test]
    fn overrides_reach_nested_sections() {
        let cfg: Config = config::Config::builder()
            .set_override("matching.text_threshold", 55.0)
            .unwrap()
            .set_override("server.max_wait_time_secs", 10)
            .unwrap()
            .set_override("security.cors_origins", "https://chat.example")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.matching.text_threshold, 55.0);
        assert_eq!(cfg.server.max_wait_time_secs, 10);
        assert_eq!(cfg.security.cors_origins, "https://chat.example");
        // Untouched sections keep their defaults
        assert_eq!(cfg.matching.video_threshold, 70.0);
        assert_eq!(cfg.port, 3720);
    }
}
