//! Category catalog loading from config.toml
//!
//! The categories listed in config.toml are inserted into the database by
//! `core::catalog::seed_categories` when a deployment is provisioned. Existing categories are
//! matched by slug and left untouched.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    /// Service categories to seed
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

/// Configuration for a single service category
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    /// Display name (e.g., "Catering")
    pub name: String,
    /// Stable identifier used to detect already seeded categories
    pub slug: String,
    /// Optional description shown to organizers
    #[serde(default)]
    pub description: Option<String>,
    /// Position in listings, lowest first
    #[serde(default)]
    pub display_order: i32,
}

/// Loads the category catalog from a TOML file
///
/// # Errors
/// Returns [`Error::Config`] if the file cannot be read, the TOML is invalid, or two
/// categories share a slug.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CatalogConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses catalog TOML text.
///
/// # Errors
/// Returns [`Error::Config`] on invalid TOML or duplicate slugs.
pub fn parse_config(contents: &str) -> Result<CatalogConfig> {
    let config: CatalogConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    let mut slugs = std::collections::HashSet::new();
    for category in &config.categories {
        if !slugs.insert(category.slug.as_str()) {
            return Err(Error::Config {
                message: format!("Duplicate category slug in config.toml: {}", category.slug),
            });
        }
    }

    Ok(config)
}

/// Loads the category catalog from the default location (./config.toml)
pub fn load_default_config() -> Result<CatalogConfig> {
    load_config("config.toml")
}
