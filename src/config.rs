use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
    #[error(transparent)]
    DotEnvError(#[from] dotenvy::Error),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Directory where uploaded image files are kept.
    pub upload_dir: PathBuf,
    /// A round can only start (and end) once the group has this many members.
    pub min_round_members: usize,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();

        let bind_address_str =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = SocketAddr::from_str(&bind_address_str)
            .map_err(|e| ConfigError::InvalidVar("BIND_ADDRESS".into(), e.to_string()))?;

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let min_round_members = match env::var("MIN_ROUND_MEMBERS") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidVar("MIN_ROUND_MEMBERS".into(), e.to_string()))?,
            Err(_) => 3,
        };

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidVar("MAX_UPLOAD_BYTES".into(), e.to_string()))?,
            Err(_) => 10 * 1024 * 1024,
        };

        Ok(Config {
            bind_address,
            upload_dir,
            min_round_members,
            max_upload_bytes,
        })
    }
}

impl Default for Config {
    /// Defaults used by tests; `load` is the production path.
    fn default() -> Self {
        Config {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            upload_dir: PathBuf::from("uploads"),
            min_round_members: 3,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}
