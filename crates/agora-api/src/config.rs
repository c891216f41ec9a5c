use anyhow::Result;

/// Runtime configuration, read once at startup. Call sites should load
/// `.env` (via dotenvy) before `from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub uploads_dir: String,
    /// Secret used to sign session tokens.
    pub session_secret: String,
    /// Base URL used when building links sent to users (verification mail).
    pub public_url: String,

    // Bootstrap admin account
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,

    // Completion API (OpenAI-compatible)
    pub completion_api_key: Option<String>,
    pub completion_base_url: String,
    pub completion_model: String,

    // Outbound mail
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port: u16 = std::env::var("AGORA_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()?;
        let smtp_port: u16 = std::env::var("EMAIL_SERVER_PORT")
            .unwrap_or_else(|_| "587".into())
            .parse()?;

        Ok(Self {
            host: std::env::var("AGORA_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            database_path: std::env::var("AGORA_DB_PATH").unwrap_or_else(|_| "agora.db".into()),
            uploads_dir: std::env::var("AGORA_UPLOADS_DIR").unwrap_or_else(|_| "./uploads".into()),
            session_secret: std::env::var("AGORA_SESSION_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".into()),
            public_url: std::env::var("AGORA_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            admin_email: std::env::var("AGORA_ADMIN_EMAIL").ok(),
            admin_password: std::env::var("AGORA_ADMIN_PASSWORD").ok(),
            completion_api_key: std::env::var("OPENAI_API_KEY").ok(),
            completion_base_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            completion_model: std::env::var("OPENAI_API_MODEL")
                .unwrap_or_else(|_| "gpt-4o".into()),
            smtp_host: std::env::var("EMAIL_SERVER_HOST").ok(),
            smtp_port,
            smtp_username: std::env::var("EMAIL_SERVER_USER").unwrap_or_default(),
            smtp_password: std::env::var("EMAIL_SERVER_PASSWORD").unwrap_or_default(),
            mail_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Agora <noreply@example.com>".into()),
        })
    }
}
