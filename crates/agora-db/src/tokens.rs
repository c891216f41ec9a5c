use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::EmailVerification;

impl Database {
    /// Store a fresh verification token for `identifier`, replacing any
    /// older tokens of the same kind so only the latest link works.
    pub fn create_verification_token(
        &self,
        identifier: &str,
        token: &str,
        kind: &str,
        expires: &str,
    ) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "DELETE FROM verification_tokens WHERE identifier = ?1 AND kind = ?2",
                [identifier, kind],
            )?;
            tx.execute(
                "INSERT INTO verification_tokens (identifier, token, kind, expires)
                 VALUES (?1, ?2, ?3, ?4)",
                [identifier, token, kind, expires],
            )?;
            Ok(())
        })
    }

    /// Redeem a token and mark the account's email verified, atomically.
    /// The token is deleted only when the account update succeeds, so a
    /// token for a missing account stays redeemable. One-time use: a
    /// successful redemption deletes it; expired or unknown tokens are
    /// rejected.
    pub fn redeem_email_verification(
        &self,
        token: &str,
        kind: &str,
    ) -> Result<EmailVerification> {
        self.transaction(|tx| {
            let identifier: Option<String> = tx
                .query_row(
                    "SELECT identifier FROM verification_tokens
                     WHERE token = ?1 AND kind = ?2 AND expires > datetime('now')",
                    [token, kind],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(email) = identifier else {
                return Ok(EmailVerification::InvalidToken);
            };

            let updated = tx.execute(
                "UPDATE users SET email_verified = datetime('now') WHERE email = ?1",
                [email.as_str()],
            )?;
            if updated == 0 {
                return Ok(EmailVerification::UnknownUser);
            }

            tx.execute(
                "DELETE FROM verification_tokens WHERE identifier = ?1 AND token = ?2",
                [email.as_str(), token],
            )?;

            Ok(EmailVerification::Verified { email })
        })
    }
}
