//! Configuration Management

use crate::capture::event_queue::DEFAULT_CAPACITY;
use crate::capture::types::TriggerKey;
use crate::gesture::Tuning;
use crate::output::ScrollUnit;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Trigger key settings
    pub trigger: TriggerConfig,
    /// Input capture settings
    pub capture: CaptureConfig,
    /// Scroll output settings
    pub output: OutputConfig,
    /// Gesture tuning
    pub tuning: Tuning,
}

/// Trigger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Modifier that arms drag-scrolling while held
    pub key: TriggerKey,
    /// Start with drag-scrolling enabled
    pub enabled: bool,
}

/// Capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Event queue size (power of 2)
    pub queue_size: usize,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub unit: ScrollUnit,
    /// Scroll against the pointer instead of with it
    pub invert: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            key: TriggerKey::default(),
            enabled: true,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            queue_size: DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.capture.queue_size.is_power_of_two() {
            return Err(crate::Error::Config(format!(
                "queue_size must be a power of 2, got {}",
                self.capture.queue_size
            )));
        }
        self.tuning.validate()
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), crate::Error> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save to default location
    pub fn save_default(&self) -> Result<(), crate::Error> {
        self.save(&Self::default_path())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Directory for config and traces
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".drag_scroll"))
            .unwrap_or_else(|| PathBuf::from(".drag_scroll"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    fn to_value(&self) -> Result<toml::Value, crate::Error> {
        toml::Value::try_from(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Look up a value by dotted key, e.g. `tuning.pause.max_secs`.
    pub fn get(&self, key: &str) -> Result<String, crate::Error> {
        let root = self.to_value()?;
        let mut node = &root;
        for part in key.split('.') {
            node = node
                .get(part)
                .ok_or_else(|| crate::Error::Config(format!("unknown config key '{}'", key)))?;
        }
        Ok(match node {
            toml::Value::String(s) => s.clone(),
            toml::Value::Table(_) => toml::to_string_pretty(node)
                .map_err(|e| crate::Error::Config(e.to_string()))?,
            other => other.to_string(),
        })
    }

    /// Set a value by dotted key. The text is parsed as the type of the
    /// current value, and the result must validate; on error the config is
    /// unchanged.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), crate::Error> {
        let unknown = || crate::Error::Config(format!("unknown config key '{}'", key));
        let mut root = self.to_value()?;

        let mut node = &mut root;
        for part in key.split('.') {
            node = node.get_mut(part).ok_or_else(unknown)?;
        }
        let raw = raw.trim();
        let invalid = |ty: &str| {
            crate::Error::Config(format!("'{}' is not a valid {} for '{}'", raw, ty, key))
        };
        *node = match node {
            toml::Value::Boolean(_) => {
                toml::Value::Boolean(raw.parse().map_err(|_| invalid("boolean"))?)
            }
            toml::Value::Integer(_) => {
                toml::Value::Integer(raw.parse().map_err(|_| invalid("integer"))?)
            }
            toml::Value::Float(_) => {
                toml::Value::Float(raw.parse().map_err(|_| invalid("number"))?)
            }
            toml::Value::String(_) => toml::Value::String(raw.trim_matches('"').to_string()),
            _ => {
                return Err(crate::Error::Config(format!(
                    "'{}' is a section, not a value",
                    key
                )))
            }
        };

        let updated: Config = root
            .try_into()
            .map_err(|e: toml::de::Error| crate::Error::Config(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
