//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing_subscriber::filter::Directive;

/// Logging output format
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Logging {
    /// Additional filtering directives
    #[serde(default, deserialize_with = "Logging::deserialize_filters")]
    pub filters: Vec<Directive>,

    /// Logging format
    #[serde(default)]
    pub format: LogFormat,
}

impl Logging {
    fn deserialize_filters<'de, D>(deserializer: D) -> Result<Vec<Directive>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let dirs: Vec<String> = Deserialize::deserialize(deserializer)?;
        dirs.into_iter()
            .map(|dir| dir.parse().map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Backend API access
#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    /// Base URL all the endpoint paths are appended to
    #[serde(default = "Api::default_base_url")]
    pub base_url: String,

    /// Single request timeout in seconds
    #[serde(default = "Api::default_timeout")]
    pub timeout_secs: u64,
}

impl Api {
    fn default_base_url() -> String {
        "http://localhost:5000".to_owned()
    }

    fn default_timeout() -> u64 {
        10
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// Analytics panel refreshing
#[derive(Debug, Clone, Deserialize)]
pub struct Analytics {
    /// Seconds between two consecutive snapshot pulls
    #[serde(default = "Analytics::default_refresh")]
    pub refresh_secs: u64,
}

impl Analytics {
    fn default_refresh() -> u64 {
        30
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }
}

impl Default for Analytics {
    fn default() -> Self {
        Self {
            refresh_secs: Self::default_refresh(),
        }
    }
}

/// Where the session survives between runs
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind")]
pub enum Store {
    /// Session kept only for the process lifetime
    Memory {
        #[serde(default = "Store::default_max_connections")]
        max_connections: u32,
    },
    /// SQLite file
    SqLite {
        path: PathBuf,
        #[serde(default = "Store::default_max_connections")]
        max_connections: u32,
        #[serde(default = "Store::default_migrate")]
        migrate: bool,
    },
}

impl Store {
    fn default_max_connections() -> u32 {
        1
    }

    fn default_migrate() -> bool {
        true
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::SqLite {
            path: "session.db".into(),
            max_connections: Self::default_max_connections(),
            migrate: Self::default_migrate(),
        }
    }
}

/// Top level client configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Backend API
    #[serde(default)]
    pub api: Api,

    /// Analytics refresh pipeline
    #[serde(default)]
    pub analytics: Analytics,

    /// Session persistence
    #[serde(default)]
    pub store: Store,

    /// Logging configuration
    #[serde(default)]
    pub logging: Logging,
}
