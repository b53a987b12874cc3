//! Access code generation.

use rand::Rng;
use sqlx::SqliteConnection;

use super::VotingError;
use crate::db::VotingSession;

/// Characters used in access codes. Upper case only so codes survive being
/// read aloud or typed from a projector.
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Attempts before giving up on finding an unused code
const MAX_CODE_ATTEMPTS: usize = 16;

/// Generate a random access code
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CODE_CHARSET.len());
            CODE_CHARSET[idx] as char
        })
        .collect()
}

/// Generate a code not used by any existing session
pub async fn unused_code(conn: &mut SqliteConnection, length: usize) -> Result<String, VotingError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_code(length);
        if !VotingSession::code_in_use(&mut *conn, &code).await? {
            return Ok(code);
        }
        tracing::debug!(length, "Access code collision, retrying");
    }
    Err(VotingError::CodeSpaceExhausted)
}
