//! Process-wide settings, read once from the environment at startup and
//! shared read-only afterwards.

use std::env;

pub const DEFAULT_PREFIX: &str = "raw_data/";
pub const DEFAULT_ENDPOINT_NAME: &str = "playing-card-classification-endpoint";
pub const DEFAULT_ARTIFACT_DIR: &str = "./artifacts";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Target bucket for artifacts. Left unset here so that a missing value
    /// fails the request that needs it rather than the whole process.
    pub bucket: Option<String>,

    /// Object key prefix, always empty or ending in `/`
    pub prefix: String,

    /// Name of the SageMaker endpoint serving the model
    pub endpoint_name: String,

    /// Plain HTTP inference URL, used instead of SageMaker when set
    pub inference_url: Option<String>,

    /// Allowed CORS origins, the first one being the fallback
    pub allowed_origins: Vec<String>,

    /// Root directory for the local artifact store
    pub artifact_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bucket: None,
            prefix: DEFAULT_PREFIX.to_owned(),
            endpoint_name: DEFAULT_ENDPOINT_NAME.to_owned(),
            inference_url: None,
            allowed_origins: vec!["*".to_owned()],
            artifact_dir: DEFAULT_ARTIFACT_DIR.to_owned(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let allowed_origins = non_empty("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.allowed_origins);

        Config {
            bucket: non_empty("BUCKET_NAME"),
            prefix: normalize_prefix(
                &lookup("S3_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_owned()),
            ),
            endpoint_name: non_empty("ENDPOINT_NAME").unwrap_or(defaults.endpoint_name),
            inference_url: non_empty("INFERENCE_URL"),
            allowed_origins,
            artifact_dir: non_empty("ARTIFACT_DIR").unwrap_or(defaults.artifact_dir),
        }
    }
}

/// Make sure a non-empty prefix ends with `/`. An empty prefix means the
/// bucket root and is left alone.
pub fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim();
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_owned()
    } else {
        format!("{}/", prefix)
    }
}
