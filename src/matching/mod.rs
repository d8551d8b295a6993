//! Compatibility scoring and the waiting-pool matching engine.
//!
//! The scorer is a pure function over two waiting peers; the engine owns the
//! waiting pool, the precomputed score index, the block list, and the match
//! history. Pair commits happen elsewhere (the server's pair registry) — the
//! engine only proposes candidates and is told afterwards what committed.

pub mod engine;
pub mod scorer;

pub use engine::{EngineStats, MatchCandidate, MatchingEngine, PeerSnapshot};
pub use scorer::compatibility_score;
