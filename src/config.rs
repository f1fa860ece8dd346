use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://api.finder.example/api";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub log_level: String,
    pub timeout_secs: u64,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_url = env::var("FINDER_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let log_level = env::var("FINDER_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        let timeout_secs = match env::var("FINDER_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("FINDER_TIMEOUT_SECS must be a number of seconds, got '{}'", raw))?,
            Err(_) => 15,
        };

        Ok(Self {
            api_url,
            log_level,
            timeout_secs,
            data_dir: Self::default_data_dir(),
        })
    }

    fn default_data_dir() -> PathBuf {
        // Use XDG data directory or fall back to the working directory
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "finder") {
            proj_dirs.data_dir().to_path_buf()
        } else {
            PathBuf::from(".finder")
        }
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
