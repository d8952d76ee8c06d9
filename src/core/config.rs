//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.shopfront/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.
//! The resolved values also seed the global store (category ids, locale)
//! at bootstrap.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use super::framework::Shopfront;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ShopConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub locale: Option<String>,
    pub log_file: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ApiConfig {
    /// "fixture" (canned demo backend) or "http".
    pub transport: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CheckoutConfig {
    pub basket_category_id: Option<u64>,
    pub checkout_confirm_category_id: Option<u64>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_TRANSPORT: &str = "fixture";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_LOG_FILE: &str = "shopfront.log";
pub const DEFAULT_BASKET_CATEGORY_ID: u64 = 8;
pub const DEFAULT_CHECKOUT_CONFIRM_CATEGORY_ID: u64 = 9;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub transport: String,
    pub base_url: String,
    pub locale: String,
    pub log_file: String,
    pub basket_category_id: u64,
    pub checkout_confirm_category_id: u64,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.shopfront/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".shopfront").join("config.toml"))
}

/// Load config from `~/.shopfront/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `ShopConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<ShopConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ShopConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(ShopConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: ShopConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &PathBuf) {
    let default_content = r#"# Shopfront Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# locale = "en"
# log_file = "shopfront.log"

# [api]
# transport = "fixture"              # "fixture" or "http"
# base_url = "http://localhost:8080" # Or set SHOPFRONT_BASE_URL env var

# [checkout]
# basket_category_id = 8             # Category shown after the basket empties
# checkout_confirm_category_id = 9   # Category behind the confirmation step
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_transport` and `cli_base_url` are from CLI flags (None = not specified).
pub fn resolve(
    config: &ShopConfig,
    cli_transport: Option<&str>,
    cli_base_url: Option<&str>,
) -> ResolvedConfig {
    // Transport: CLI → env → config → default
    let transport = cli_transport
        .map(|s| s.to_string())
        .or_else(|| std::env::var("SHOPFRONT_TRANSPORT").ok())
        .or_else(|| config.api.transport.clone())
        .unwrap_or_else(|| DEFAULT_TRANSPORT.to_string());

    // Base URL: CLI → env → config → default
    let base_url = cli_base_url
        .map(|s| s.to_string())
        .or_else(|| std::env::var("SHOPFRONT_BASE_URL").ok())
        .or_else(|| config.api.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    // Locale: env → config → default
    let locale = std::env::var("SHOPFRONT_LOCALE")
        .ok()
        .or_else(|| config.general.locale.clone())
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string());

    ResolvedConfig {
        transport,
        base_url,
        locale,
        log_file: config
            .general
            .log_file
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
        basket_category_id: config
            .checkout
            .basket_category_id
            .unwrap_or(DEFAULT_BASKET_CATEGORY_ID),
        checkout_confirm_category_id: config
            .checkout
            .checkout_confirm_category_id
            .unwrap_or(DEFAULT_CHECKOUT_CONFIRM_CATEGORY_ID),
    }
}

/// Write the well-known globals the feature services read. Write-once
/// semantics make this a no-op for anything a caller seeded earlier.
pub fn seed_globals(resolved: &ResolvedConfig, shopfront: &Shopfront) {
    shopfront.set_global("basket-category-id", json!(resolved.basket_category_id));
    shopfront.set_global(
        "checkout-confirm-category-id",
        json!(resolved.checkout_confirm_category_id),
    );
    shopfront.set_global("shop-locale", json!(resolved.locale));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;

    #[test]
    fn test_default_config_parses() {
        let config = ShopConfig::default();
        assert!(config.general.locale.is_none());
        assert!(config.api.transport.is_none());
        assert!(config.checkout.basket_category_id.is_none());
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let config = ShopConfig::default();
        let resolved = resolve(&config, None, None);
        assert_eq!(resolved.transport, DEFAULT_TRANSPORT);
        assert_eq!(resolved.base_url, DEFAULT_BASE_URL);
        assert_eq!(resolved.locale, DEFAULT_LOCALE);
        assert_eq!(resolved.basket_category_id, DEFAULT_BASKET_CATEGORY_ID);
    }

    #[test]
    fn test_resolve_config_values_override_defaults() {
        let config = ShopConfig {
            general: GeneralConfig {
                locale: Some("de".to_string()),
                log_file: Some("shop.log".to_string()),
            },
            api: ApiConfig {
                transport: Some("http".to_string()),
                base_url: Some("https://shop.example".to_string()),
            },
            checkout: CheckoutConfig {
                basket_category_id: Some(101),
                checkout_confirm_category_id: Some(102),
            },
        };
        let resolved = resolve(&config, None, None);
        assert_eq!(resolved.transport, "http");
        assert_eq!(resolved.base_url, "https://shop.example");
        assert_eq!(resolved.locale, "de");
        assert_eq!(resolved.log_file, "shop.log");
        assert_eq!(resolved.basket_category_id, 101);
        assert_eq!(resolved.checkout_confirm_category_id, 102);
    }

    #[test]
    fn test_resolve_cli_flags_win() {
        let config = ShopConfig {
            api: ApiConfig {
                transport: Some("http".to_string()),
                base_url: Some("https://shop.example".to_string()),
            },
            ..Default::default()
        };
        let resolved = resolve(&config, Some("fixture"), Some("http://127.0.0.1:9999"));
        assert_eq!(resolved.transport, "fixture");
        assert_eq!(resolved.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
[general]
locale = "de"

[api]
transport = "http"
base_url = "https://shop.example/rest"

[checkout]
basket_category_id = 12
"#;
        let config: ShopConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.locale.as_deref(), Some("de"));
        assert_eq!(config.api.transport.as_deref(), Some("http"));
        assert_eq!(config.checkout.basket_category_id, Some(12));
        assert_eq!(config.checkout.checkout_confirm_category_id, None);
    }

    #[test]
    fn test_sparse_toml_parses() {
        // Only override one thing, everything else stays default
        let toml_str = r#"
[api]
base_url = "http://192.168.1.50:8080"
"#;
        let config: ShopConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.api.base_url.as_deref(),
            Some("http://192.168.1.50:8080")
        );
        assert!(config.api.transport.is_none());
        assert!(config.general.locale.is_none());
    }

    #[test]
    fn test_seed_globals_respects_write_once() {
        let fw = Shopfront::new(Page::new());
        fw.set_global("basket-category-id", json!(55));
        let resolved = resolve(&ShopConfig::default(), None, None);
        seed_globals(&resolved, &fw);
        assert_eq!(fw.globals().get_u64("basket-category-id"), Some(55));
        assert_eq!(
            fw.globals().get_str("shop-locale").as_deref(),
            Some(DEFAULT_LOCALE)
        );
    }
}
