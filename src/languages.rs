//! Language configuration for execution

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::core::Language;

/// Configuration for a supported programming language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Name of the source file (e.g., "main.py")
    pub source_file: String,
    /// Run command, executed from the scratch directory
    pub run_command: Vec<String>,
    /// Extra environment variables as (key, value)
    pub env: Vec<(String, String)>,
    /// Time limit multiplier and bonus: (multiplier, bonus_seconds)
    /// actual_time = base_time * multiplier + bonus
    pub time_limit: Option<(u32, u32)>,
    /// Memory limit multiplier and bonus: (multiplier, bonus_mb)
    /// actual_memory = base_memory * multiplier + bonus
    pub memory_limit: Option<(u32, u32)>,
}

impl LanguageConfig {
    /// Adjusted time limit in seconds
    pub fn calculate_time_limit(&self, base_secs: f64) -> f64 {
        match self.time_limit {
            Some((multiplier, bonus_seconds)) => {
                base_secs * f64::from(multiplier) + f64::from(bonus_seconds)
            }
            None => base_secs,
        }
    }

    /// Adjusted memory limit in MB
    pub fn calculate_memory_limit(&self, base_memory_mb: u64) -> u64 {
        match self.memory_limit {
            Some((multiplier, bonus_mb)) => {
                base_memory_mb * u64::from(multiplier) + u64::from(bonus_mb)
            }
            None => base_memory_mb,
        }
    }
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    source_file: String,
    run_command: String,
    #[serde(default)]
    env: Vec<String>,
    #[serde(default)]
    time_limit: Vec<String>,
    #[serde(default)]
    memory_limit: Vec<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Language definitions keyed by lowercase name and alias
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: HashMap<String, LanguageConfig>,
}

impl LanguageRegistry {
    /// Definitions compiled into the binary from `files/languages.toml`
    pub fn builtin() -> anyhow::Result<Self> {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
        Self::from_toml(content).context("Failed to parse builtin language definitions")
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read language config: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse language config: {}", path.display()))
    }

    /// Load from `path` when given, otherwise the builtin definitions
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)?;

        let mut languages = HashMap::new();

        for (name, raw) in raw_configs {
            let parse_limit =
                |raw_limit: Vec<String>, kind: &str| -> anyhow::Result<Option<(u32, u32)>> {
                    if raw_limit.is_empty() {
                        return Ok(None);
                    }
                    if raw_limit.len() != 2 {
                        anyhow::bail!("Invalid {} limit for {}: {:?}", kind, name, raw_limit);
                    }
                    let multiplier = raw_limit[0].parse::<u32>().with_context(|| {
                        format!("Invalid {} multiplier for {}: {}", kind, name, raw_limit[0])
                    })?;
                    let offset = raw_limit[1].parse::<u32>().with_context(|| {
                        format!("Invalid {} offset for {}: {}", kind, name, raw_limit[1])
                    })?;
                    Ok(Some((multiplier, offset)))
                };

            let run_command = into_command(&raw.run_command);
            if run_command.is_empty() {
                anyhow::bail!("Empty run command for {}", name);
            }

            let env = raw
                .env
                .iter()
                .map(|entry| {
                    entry
                        .split_once('=')
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .ok_or_else(|| {
                            anyhow::anyhow!("Invalid env entry for {}: {}", name, entry)
                        })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let config = LanguageConfig {
                source_file: raw.source_file,
                run_command,
                env,
                time_limit: parse_limit(raw.time_limit, "time")?,
                memory_limit: parse_limit(raw.memory_limit, "memory")?,
            };

            languages.insert(name.to_lowercase(), config.clone());

            for alias in raw.aliases {
                languages.insert(alias.to_lowercase(), config.clone());
            }
        }

        Ok(Self { languages })
    }

    pub fn get(&self, language: Language) -> Option<&LanguageConfig> {
        self.lookup(language.as_str())
    }

    /// Look up by name or alias, case-insensitive
    pub fn lookup(&self, name: &str) -> Option<&LanguageConfig> {
        self.languages.get(&name.to_lowercase())
    }

    pub fn supported(&self) -> Vec<String> {
        let mut names: Vec<String> = self.languages.keys().cloned().collect();
        names.sort();
        names
    }
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
