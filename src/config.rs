//! Server configuration from command-line flags and environment variables.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::login::{AdminGate, HashedSecret, SharedSecret};
use crate::saving::DatasetStore;

/// Recipe catalog and cost calculator web server
#[derive(Parser, Debug, Clone)]
#[command(name = "recetario")]
#[command(about = "Recipe catalog and cost calculator")]
pub struct Config {
    /// JSON document holding the ingredient catalog and every recipe
    #[arg(long, env = "RECETARIO_DATA_FILE", default_value = "data/recetas.json")]
    pub data_file: PathBuf,

    /// Shared administrator password, compared in plaintext
    #[arg(
        long,
        env = "RECETARIO_ADMIN_PASSWORD",
        default_value = "admin123",
        hide_env_values = true
    )]
    pub admin_password: String,

    /// Argon2 PHC hash of the administrator password; takes precedence over
    /// --admin-password when set
    #[arg(long, env = "RECETARIO_ADMIN_PASSWORD_HASH", hide_env_values = true)]
    pub admin_password_hash: Option<String>,

    /// Seconds a loaded dataset is reused before the file is read again
    #[arg(long, env = "RECETARIO_CACHE_TTL_SECS", default_value_t = 60)]
    pub cache_ttl_secs: u64,

    /// Address to listen on
    #[arg(long, env = "RECETARIO_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Directory recipe images are served from, under /images
    #[arg(long, env = "RECETARIO_IMAGES_DIR", default_value = "images")]
    pub images_dir: PathBuf,

    /// Log filter (error, warn, info, debug, trace or env_logger directives)
    #[arg(long, env = "RECETARIO_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn store(&self) -> DatasetStore {
        DatasetStore::new(&self.data_file, Duration::from_secs(self.cache_ttl_secs))
    }

    pub fn gate(&self) -> Result<Box<dyn AdminGate>, String> {
        match &self.admin_password_hash {
            Some(hash) => Ok(Box::new(HashedSecret::new(hash.clone())?)),
            None => Ok(Box::new(SharedSecret::new(self.admin_password.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "recetario",
            "--data-file",
            "/tmp/otro.json",
            "--cache-ttl-secs",
            "5",
            "--listen",
            "0.0.0.0:8080",
        ]);
        assert_eq!(config.data_file, PathBuf::from("/tmp/otro.json"));
        assert_eq!(config.cache_ttl_secs, 5);
        assert_eq!(config.listen.port(), 8080);
    }

    #[test]
    fn hash_takes_precedence() {
        let hash = crate::login::hash_password("clave").unwrap();
        let config = Config::parse_from([
            "recetario",
            "--admin-password",
            "admin123",
            "--admin-password-hash",
            &hash,
        ]);
        let gate = config.gate().unwrap();
        assert!(gate.admit("clave"));
        assert!(!gate.admit("admin123"));
    }
}
