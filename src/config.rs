use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::store::validate_prefix;

pub const DEFAULT_DATABASE_PATH: &str = "dfes_incidents.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3146";
pub const DEFAULT_TABLE_PREFIX: &str = "wp_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub table_prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let database_path = PathBuf::from(get("DFES_DATABASE_PATH", DEFAULT_DATABASE_PATH));

        let raw_addr = get("DFES_BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = raw_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("DFES_BIND_ADDR is not a socket address: {}", raw_addr))?;

        // An explicitly empty prefix is allowed, so this one skips `get`.
        let table_prefix = lookup("DFES_TABLE_PREFIX")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| DEFAULT_TABLE_PREFIX.to_string());
        validate_prefix(&table_prefix).context("DFES_TABLE_PREFIX is invalid")?;

        Ok(Self {
            database_path,
            bind_addr,
            table_prefix,
        })
    }
}
