use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::types::{StorageError, StorageResult};

const DEFAULT_REGION: &str = "us-east-1";
const ENV_PREFIX: &str = "OBJECT_TRANSFER";

/// Which `ObjectStorage` implementation `storage::connect` builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    S3,
    Mock,
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageProvider::S3 => write!(f, "s3"),
            StorageProvider::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for StorageProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(StorageProvider::S3),
            "mock" => Ok(StorageProvider::Mock),
            other => Err(format!("unknown storage provider {:?} (expected s3 or mock)", other)),
        }
    }
}

/// Where the live client gets its credentials from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CredentialSource {
    /// Environment variables, shared credentials file, then instance role.
    #[default]
    Chain,
    Profile {
        name: String,
    },
    Static {
        access_key_id: String,
        secret_access_key: String,
        #[serde(default)]
        session_token: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub provider: StorageProvider,
    pub region: String,
    pub endpoint: Option<String>,
    pub path_style: bool,
    pub credentials: CredentialSource,
    /// Request AES256 server-side encryption on upload.
    pub encrypt_at_rest: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::S3,
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            path_style: false,
            credentials: CredentialSource::Chain,
            encrypt_at_rest: true,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> StorageResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let provider = match var("STORAGE_PROVIDER") {
            Some(value) => value.parse::<StorageProvider>().map_err(StorageError::Configuration)?,
            None => StorageProvider::default(),
        };

        let region = var("S3_REGION")
            .or_else(|| var("AWS_REGION"))
            .or_else(|| var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let credentials = match (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => CredentialSource::Static {
                access_key_id,
                secret_access_key,
                session_token: var("AWS_SESSION_TOKEN"),
            },
            _ => match var("AWS_PROFILE") {
                Some(name) => CredentialSource::Profile { name },
                None => CredentialSource::Chain,
            },
        };

        Ok(Self {
            provider,
            region,
            endpoint: var("S3_ENDPOINT"),
            path_style: parse_bool("S3_PATH_STYLE", var("S3_PATH_STYLE"), false)?,
            credentials,
            encrypt_at_rest: parse_bool("S3_ENCRYPTION", var("S3_ENCRYPTION"), true)?,
        })
    }

    /// Load from a config file (toml, yaml or json) with `OBJECT_TRANSFER__*`
    /// environment overrides layered on top.
    pub fn load(path: &Path) -> StorageResult<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| {
                StorageError::Configuration(format!("failed to read {}: {}", path.display(), e))
            })?;

        settings
            .try_deserialize()
            .map_err(|e| StorageError::Configuration(format!("{}: {}", path.display(), e)))
    }
}

fn parse_bool(name: &str, value: Option<String>, default: bool) -> StorageResult<bool> {
    match value {
        None => Ok(default),
        Some(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(StorageError::Configuration(format!(
                "{} must be a boolean, got {:?}",
                name, other
            ))),
        },
    }
}
