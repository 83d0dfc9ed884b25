//! Language configuration for harness synthesis and sandbox dispatch

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::driver::{DriverBackend, DriverKind};
use crate::models::MethodSignature;
use crate::sandbox::ANY_VERSION;

/// Sandbox runtime a language is executed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
    /// Sandbox language identifier (e.g., "python")
    pub language: String,
    /// Version selector, "*" for the newest installed
    pub version: String,
    /// Name given to the uploaded source file, if the runtime cares
    pub source_file: Option<String>,
}

/// Configuration for a supported programming language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Canonical language name
    pub name: String,
    pub runtime: Runtime,
    pub driver: DriverKind,
}

impl LanguageConfig {
    /// Wrap user code in this language's harness
    pub fn synthesize(&self, user_code: &str, signature: Option<&MethodSignature>) -> String {
        self.driver.backend().synthesize(user_code, signature)
    }
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    /// Defaults to the table name
    runtime: Option<String>,
    version: Option<String>,
    driver: DriverKind,
    source_file: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Language tag → harness backend and sandbox runtime
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    languages: HashMap<String, LanguageConfig>,
}

impl LanguageRegistry {
    /// Registry built from the bundled `files/languages.toml`
    pub fn builtin() -> anyhow::Result<Self> {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
        Self::from_toml_str(content).context("Invalid bundled language configuration")
    }

    /// Load language configurations from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read language config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid language config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)?;

        let mut languages = HashMap::new();

        for (name, raw) in raw_configs {
            let name = name.to_lowercase();
            let config = LanguageConfig {
                name: name.clone(),
                runtime: Runtime {
                    language: raw.runtime.unwrap_or_else(|| name.clone()),
                    version: raw.version.unwrap_or_else(|| ANY_VERSION.to_string()),
                    source_file: raw.source_file,
                },
                driver: raw.driver,
            };

            // Add main language name and aliases
            for key in std::iter::once(name.clone()).chain(raw.aliases.iter().map(|a| a.to_lowercase())) {
                if languages.insert(key.clone(), config.clone()).is_some() {
                    anyhow::bail!("Language tag '{}' is defined more than once", key);
                }
            }
        }

        Ok(Self { languages })
    }

    /// Get language configuration by name or alias (case-insensitive)
    pub fn get(&self, language: &str) -> Option<&LanguageConfig> {
        self.languages.get(&language.trim().to_lowercase())
    }

    /// Canonical names of all supported languages
    pub fn supported_languages(&self) -> Vec<String> {
        self.languages
            .values()
            .map(|config| config.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
