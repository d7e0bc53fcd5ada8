use uuid::Uuid;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

// Fresh key per checkout attempt; retries of the same attempt reuse it
pub fn generate_idempotency_key() -> String {
    Uuid::new_v4().hyphenated().to_string()
}
