use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Translation engine configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether `@authorization` and `@authentication` rules are enforced
    pub authorization_enabled: bool,

    /// Claim aliases: rule field name to dotted path inside the decoded JWT
    #[validate(custom(function = "validate_claim_paths"))]
    pub jwt_claims: BTreeMap<String, String>,

    /// Whether mutations also return change events
    pub subscriptions_enabled: bool,

    /// Maximum nesting of relationship traversal during one translation
    #[validate(range(
        min = 1,
        max = 256,
        message = "Max depth must be between 1 and 256"
    ))]
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            authorization_enabled: false,
            jwt_claims: BTreeMap::new(),
            subscriptions_enabled: false,
            max_depth: 32,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables with validation
    ///
    /// `CYPHERGEN_JWT_CLAIMS` holds comma separated `name=path` pairs.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            authorization_enabled: parse_env_var("CYPHERGEN_AUTHORIZATION", "false")?,
            jwt_claims: parse_claim_aliases(&read_env_var("CYPHERGEN_JWT_CLAIMS", "")?)?,
            subscriptions_enabled: parse_env_var("CYPHERGEN_SUBSCRIPTIONS", "false")?,
            max_depth: parse_env_var("CYPHERGEN_MAX_DEPTH", "32")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            authorization_enabled: cli.authorization_enabled,
            jwt_claims: parse_claim_aliases(&cli.jwt_claims.join(","))?,
            subscriptions_enabled: cli.subscriptions_enabled,
            max_depth: cli.max_depth,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Dotted claim path for a rule field, the field itself when not aliased.
    pub fn claim_path<'a>(&'a self, field: &'a str) -> &'a str {
        self.jwt_claims.get(field).map(String::as_str).unwrap_or(field)
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub authorization_enabled: bool,
    pub jwt_claims: Vec<String>,
    pub subscriptions_enabled: bool,
    pub max_depth: usize,
}

/// Read an environment variable, falling back to `default` when unset
fn read_env_var(key: &str, default: &str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(value),
        Err(env::VarError::NotPresent) => Ok(default.to_string()),
        Err(e) => Err(e.into()),
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = read_env_var(key, default)?;
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

fn parse_claim_aliases(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut aliases = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
                aliases.insert(name.trim().to_string(), path.trim().to_string());
            }
            _ => {
                return Err(ConfigError::Parse {
                    field: "jwt_claims".to_string(),
                    value: pair.to_string(),
                    source: "expected name=path".into(),
                })
            }
        }
    }
    Ok(aliases)
}

fn validate_claim_paths(claims: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    for path in claims.values() {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            let mut error = ValidationError::new("claim_path");
            error.message = Some(format!("Invalid claim path '{}'", path).into());
            return Err(error);
        }
    }
    Ok(())
}
