use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ShopError};
use crate::tools::Product;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub catalog: CatalogConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Tool server executable; the running binary when unset
    pub command: Option<PathBuf>,
    pub args: Vec<String>,
    pub name: String,
    pub version: String,
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: vec!["serve".to_string()],
            name: "Product Price Server".to_string(),
            version: "1.0.0".to_string(),
            shutdown_grace_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-exchange deadline; `None` blocks until the server replies
    pub request_timeout_ms: Option<u64>,
    pub client_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: Some(30000),
            client_name: "interactive-client".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub products: Vec<Product>,
    pub max_quantity: u64,
    /// Exclusive lower bound for the retained percentage
    pub min_retain_percentage: f64,
    /// Exclusive upper bound for the retained percentage
    pub max_retain_percentage: f64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            products: Product::defaults(),
            max_quantity: 1000,
            min_retain_percentage: 0.0,
            max_retain_percentage: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub api_base: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub polish_responses: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo-preview".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 1024,
            timeout_ms: 60000,
            polish_responses: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            catalog: CatalogConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ShopError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| ShopError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Reject settings that would make the catalog unusable.
    pub fn validate(&self) -> Result<()> {
        let catalog = &self.catalog;
        if catalog.products.is_empty() {
            return Err(ShopError::Config("catalog.products must not be empty".into()));
        }
        if catalog.max_quantity == 0 {
            return Err(ShopError::Config("catalog.max_quantity must be at least 1".into()));
        }
        if catalog.min_retain_percentage >= catalog.max_retain_percentage {
            return Err(ShopError::Config(format!(
                "catalog.min_retain_percentage ({}) must be below max_retain_percentage ({})",
                catalog.min_retain_percentage, catalog.max_retain_percentage
            )));
        }
        if let Some(dup) = catalog
            .products
            .iter()
            .enumerate()
            .find(|(i, p)| catalog.products[..*i].iter().any(|q| q.id == p.id))
            .map(|(_, p)| p)
        {
            return Err(ShopError::Config(format!("duplicate product id '{}'", dup.id)));
        }
        Ok(())
    }
}
