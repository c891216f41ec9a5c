use anyhow::Result;
use chrono::Utc;
use rand::RngCore;

use agora_db::Database;
use agora_db::models::EmailVerification;

pub const KIND_VERIFICATION: &str = "verification";

const TOKEN_BYTES: usize = 32;
const TOKEN_TTL_HOURS: i64 = 24;

/// Random URL-safe token, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issue a 24-hour email verification token, replacing any earlier token
/// for the same address.
pub fn create_verification_token(db: &Database, email: &str) -> Result<String> {
    let token = generate_token();
    let expires = (Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    db.create_verification_token(email, &token, KIND_VERIFICATION, &expires)?;
    Ok(token)
}

/// Redeem a verification token, marking the matching account's email
/// verified in the same transaction.
pub fn redeem_verification(db: &Database, token: &str) -> Result<EmailVerification> {
    db.redeem_email_verification(token, KIND_VERIFICATION)
}
