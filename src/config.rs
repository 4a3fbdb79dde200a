use crate::error::{EvalError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "RH_EVAL_CONFIG";
pub const DATABASE_PATH_ENV: &str = "RH_EVAL_DATABASE_PATH";
pub const TENANT_ENV: &str = "RH_EVAL_TENANT";
pub const LOG_DIR_ENV: &str = "RH_EVAL_LOG_DIR";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/rh_eval.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Tenant used when the command line does not name one.
    pub default_tenant: String,
    /// Extra cell values treated as missing, on top of the built-in NA sentinels.
    pub missing_values: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_tenant: "default".to_string(),
            missing_values: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_prefix: "rh_eval.log".to_string(),
        }
    }
}

impl Config {
    /// Loads `.env`, then the TOML file named by `RH_EVAL_CONFIG` (or `config.toml`),
    /// then applies environment overrides. A missing config file yields defaults.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EvalError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.import.default_tenant.trim().is_empty() {
            return Err(EvalError::Config(
                "import.default_tenant must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(DATABASE_PATH_ENV) {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(tenant) = std::env::var(TENANT_ENV) {
            if !tenant.trim().is_empty() {
                self.import.default_tenant = tenant;
            }
        }
        if let Ok(dir) = std::env::var(LOG_DIR_ENV) {
            self.logging.dir = PathBuf::from(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.import.default_tenant, "default");
        assert_eq!(config.database.path, PathBuf::from("data/rh_eval.db"));
        assert_eq!(config.logging.file_prefix, "rh_eval.log");
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            [database]
            path = "/tmp/eval.db"

            [import]
            default_tenant = "acme"
            missing_values = ["-", "n.a."]
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/eval.db"));
        assert_eq!(config.import.default_tenant, "acme");
        assert_eq!(config.import.missing_values, vec!["-", "n.a."]);
        assert_eq!(config.logging.dir, PathBuf::from("logs"));
    }

    #[test]
    fn blank_tenant_is_rejected() {
        let err = Config::from_toml_str("[import]\ndefault_tenant = \"  \"\n").unwrap_err();
        assert!(matches!(err, EvalError::Config(_)));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/rh_eval.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
