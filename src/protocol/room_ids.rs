use rand::Rng;

/// Generate a room identifier: millisecond timestamp plus 64 bits of
/// randomness, so ids are unique and not guessable from earlier ones.
pub fn generate_room_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::rng();
    let nonce: u64 = rng.random();
    format!("r{millis}-{nonce:016x}")
}
