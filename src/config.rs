use anyhow::{anyhow, Result};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::applications::ListingMode;
use crate::identity::DEFAULT_AUTH_LATENCY;

const DATA_PATH_VAR: &str = "ADMIT_DATA_PATH";
const LISTING_MODE_VAR: &str = "ADMIT_LISTING_MODE";
const AUTH_LATENCY_VAR: &str = "ADMIT_AUTH_LATENCY_MS";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: PathBuf,
    pub listing_mode: ListingMode,
    pub auth_latency: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_path = match lookup(DATA_PATH_VAR) {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => {
                let path = default_data_path();
                info!("{DATA_PATH_VAR} not set, using {}", path.display());
                path
            }
        };

        let listing_mode = parse_or(&lookup, LISTING_MODE_VAR, "legacy")?;
        let default_latency = DEFAULT_AUTH_LATENCY.as_millis().to_string();
        let latency_ms: u64 = parse_or(&lookup, AUTH_LATENCY_VAR, &default_latency)?;

        Ok(Self {
            data_path,
            listing_mode,
            auth_latency: Duration::from_millis(latency_ms),
        })
    }
}

fn default_data_path() -> PathBuf {
    // XDG data directory, or the working directory when there is no home
    match directories::ProjectDirs::from("", "", "admit") {
        Some(dirs) => dirs.data_dir().join("admit.db"),
        None => PathBuf::from("admit.db"),
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow!("Invalid {key} value '{raw}': {e}"))
}
