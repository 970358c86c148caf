use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://gql.hashnode.com";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub endpoint: String,
    pub publication_host: String,
    pub page_size: u32,
    /// How long a stored first page stays fresh before it is regenerated
    pub revalidate: Duration,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from the process environment (and `.env`, if
    /// present). Values returned by `overrides` win over the environment.
    pub fn from_env_with(overrides: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| overrides(key).or_else(|| std::env::var(key).ok()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // the NEXT_PUBLIC_ names are what existing blog deployments already export
        let first_of = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
        };

        let endpoint = first_of(&["HASHNODE_GQL_ENDPOINT", "NEXT_PUBLIC_HASHNODE_GQL_ENDPOINT"])
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let publication_host = first_of(&[
            "HASHNODE_PUBLICATION_HOST",
            "NEXT_PUBLIC_HASHNODE_PUBLICATION_HOST",
        ])
        .ok_or_else(|| ConfigError::MissingEnvVar("HASHNODE_PUBLICATION_HOST".to_string()))?;

        let page_size = match lookup("RECAPFEED_PAGE_SIZE") {
            Some(raw) => parse_page_size(&raw)?,
            None => DEFAULT_PAGE_SIZE,
        };

        let revalidate = match lookup("RECAPFEED_REVALIDATE_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|source| {
                ConfigError::ParseInt {
                    name: "RECAPFEED_REVALIDATE_SECS".to_string(),
                    source,
                }
            })?),
            None => Duration::from_secs(1),
        };

        let data_dir = lookup("RECAPFEED_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir).to_string()));

        Ok(Self {
            endpoint,
            publication_host,
            page_size,
            revalidate,
            data_dir,
        })
    }
}

pub fn parse_page_size(raw: &str) -> Result<u32, ConfigError> {
    let size: u32 = raw.trim().parse().map_err(|source| ConfigError::ParseInt {
        name: "RECAPFEED_PAGE_SIZE".to_string(),
        source,
    })?;

    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(ConfigError::InvalidValue {
            name: "RECAPFEED_PAGE_SIZE".to_string(),
            message: format!("must be between 1 and {}", MAX_PAGE_SIZE),
        });
    }

    Ok(size)
}
