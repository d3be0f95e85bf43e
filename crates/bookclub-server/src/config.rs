use std::{path::PathBuf, time::Duration};

use crate::error::Result;
use bookclub_app::state::AppConfig;
pub use clap::Parser;

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "BOOKCLUB_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "BOOKCLUB_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[arg(
        long,
        env = "BOOKCLUB_DATABASE_URL",
        help = "Database URL e.g. sqlite://file.db, default is sqlite://[data-dir]/bookclub.db, where data-dir is set by --data-dir"
    )]
    database_url: Option<String>,

    #[arg(
        long,
        env = "BOOKCLUB_DATA_DIR",
        help = "Data directory for database, default is system default like ~/.local/share/bookclub",
        default_value_t = default_data_dir()
    )]
    data_dir: String,

    #[arg(
        long,
        env = "BOOKCLUB_ADMIN_EMAILS",
        value_delimiter = ',',
        default_value = "admin@example.com",
        help = "E-mails of administrators, comma separated"
    )]
    pub admin_emails: Vec<String>,

    #[arg(
        long,
        env = "BOOKCLUB_SESSION_EXPIRY",
        default_value = "1 day",
        help = "Session expires after this period of inactivity, in human friendly format (e.g. 1d, 1h, 30m - or combined)",
        value_parser = humantime::parse_duration
    )]
    pub session_expiry: Duration,

    #[arg(
        long,
        env = "BOOKCLUB_SECURE_COOKIE",
        help = "Send session cookie only over HTTPS"
    )]
    pub secure_cookie: bool,

    #[arg(long, env = "BOOKCLUB_NO_CORS", help = "Disable CORS")]
    pub no_cors: bool,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("bookclub"))
        .unwrap_or_else(|| PathBuf::from("bookclub"))
        .to_string_lossy()
        .to_string()
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/bookclub.db?mode=rwc", self.data_dir))
    }

    /// Whether default data directory is in use, so it should be created
    pub fn uses_data_dir(&self) -> bool {
        self.database_url.is_none()
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(config: &ServerConfig) -> Self {
        AppConfig {
            admin_emails: config.admin_emails.clone(),
            session_expiry: config.session_expiry,
            secure_cookie: config.secure_cookie,
        }
    }
}
