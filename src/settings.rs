use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classifier::{DATE_MARKER, REMARK_MARKER};
use crate::error::{BillError, Result};

/// What a parent header without any sub-category produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyParentPolicy {
    #[default]
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoRenewalRule {
    /// `Parent.sub`, or a bare `sub` matched under any parent.
    pub header_location: String,
    pub amount: f64,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoRenewalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<AutoRenewalRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatterConfig {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_currency_symbol() -> String {
    "¥".to_string()
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_metadata_prefixes")]
    pub metadata_prefixes: Vec<String>,
    #[serde(default)]
    pub auto_renewal: AutoRenewalConfig,
    #[serde(default)]
    pub parent_item_display_names: BTreeMap<String, String>,
    #[serde(default)]
    pub empty_parent_policy: EmptyParentPolicy,
    #[serde(default)]
    pub formatter: FormatterConfig,
}

fn default_metadata_prefixes() -> Vec<String> {
    vec![DATE_MARKER.to_string(), REMARK_MARKER.to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            metadata_prefixes: default_metadata_prefixes(),
            auto_renewal: AutoRenewalConfig::default(),
            parent_item_display_names: BTreeMap::new(),
            empty_parent_policy: EmptyParentPolicy::default(),
            formatter: FormatterConfig::default(),
        }
    }
}

impl Settings {
    pub fn display_name<'a>(&'a self, parent: &'a str) -> &'a str {
        self.parent_item_display_names
            .get(parent)
            .map(String::as_str)
            .unwrap_or(parent)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("billkeep.db")
    }

    pub fn exports_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("exports")
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("billkeep")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("billkeep")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    let content = std::fs::read_to_string(&path).unwrap_or_default();
    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
            Settings::default()
        }
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| BillError::Config(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

/// Reject settings the pipeline cannot run with. Malformed renewal rules only
/// degrade: they are logged here and skipped at injection time.
pub fn check_settings(settings: &Settings) -> Result<()> {
    for marker in [DATE_MARKER, REMARK_MARKER] {
        let present = settings
            .metadata_prefixes
            .iter()
            .any(|p| p.eq_ignore_ascii_case(marker));
        if !present {
            return Err(BillError::Config(format!(
                "metadata_prefixes must include '{marker}'"
            )));
        }
    }
    if settings.auto_renewal.enabled {
        for rule in &settings.auto_renewal.rules {
            if rule.header_location.trim().is_empty() || rule.description.trim().is_empty() {
                tracing::warn!(?rule, "auto-renewal rule needs a header_location and a description");
            }
        }
    }
    Ok(())
}
