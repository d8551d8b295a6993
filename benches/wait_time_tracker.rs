use criterion::{criterion_group, criterion_main, Criterion};
use pairlink_server::config::MatchingConfig;
use pairlink_server::matching::{compatibility_score, PeerSnapshot};
use pairlink_server::metrics::WaitTimeTracker;
use pairlink_server::protocol::{AgeRange, ChatMode, Gender, GenderPreference, Profile};
use std::collections::BTreeSet;
use std::hint::black_box;
use std::time::{Duration, Instant};
use uuid::Uuid;

fn snapshot(age: u8, interests: &[&str]) -> PeerSnapshot {
    PeerSnapshot {
        peer_id: Uuid::new_v4(),
        profile: Profile {
            username: format!("peer-{age}"),
            gender: Gender::NotSpecified,
            age,
            interests: interests
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<_>>(),
            chat_mode: ChatMode::Text,
            gender_preference: GenderPreference::Any,
            age_range: AgeRange::default(),
            priority: 1.0,
        },
        joined_at: Instant::now(),
        attempts: 0,
    }
}

fn bench_wait_time_tracker(c: &mut Criterion) {
    c.bench_function("wait_time_tracker_record", |b| {
        b.iter(|| {
            let mut tracker = WaitTimeTracker::new();
            for sample in 0..512u64 {
                let duration = Duration::from_millis(500 + (sample % 250));
                tracker.add_sample(duration);
            }
            tracker
        });
    });

    c.bench_function("wait_time_tracker_metrics", |b| {
        let mut tracker = WaitTimeTracker::new();
        for sample in 0..5000u64 {
            let duration = Duration::from_millis(300 + (sample % 200));
            tracker.add_sample(duration);
        }

        b.iter(|| {
            black_box(tracker.metrics());
        });
    });
}

fn bench_compatibility_score(c: &mut Criterion) {
    let config = MatchingConfig::default();
    let a = snapshot(25, &["music", "travel", "games"]);
    let b = snapshot(27, &["music", "hiking"]);
    let now = Instant::now();

    c.bench_function("compatibility_score", |bench| {
        bench.iter(|| black_box(compatibility_score(&a, &b, now, 0, &config)));
    });
}

criterion_group!(wait_time_tracker, bench_wait_time_tracker, bench_compatibility_score);
criterion_main!(wait_time_tracker);
