use std::{fs, path};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub trait Configurable {
    fn config(&self) -> &serde_yaml::Value;

    // read configuration from yaml config
    fn load_config(
        config_file_path: impl AsRef<path::Path>,
    ) -> Result<serde_yaml::Value, ConfigError> {
        let content: String = fs::read_to_string(config_file_path)?;
        let config: serde_yaml::Value = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Extract Value from config using dot notation i.e. "poller.interval"
    fn get_config_value(&self, key: &str) -> Option<&serde_yaml::Value> {
        if key.is_empty() {
            return None;
        }
        let keys: Vec<&str> = key.split('.').collect();
        Self::get_value_recursive(self.config(), &keys)
    }

    fn get_value_recursive<'a>(
        config: &'a serde_yaml::Value,
        keys: &[&str],
    ) -> Option<&'a serde_yaml::Value> {
        let (key, remaining_keys) = keys.split_first()?;

        match config {
            serde_yaml::Value::Mapping(map) => {
                let value = map.get(serde_yaml::Value::String(key.to_string()))?;
                if remaining_keys.is_empty() {
                    Some(value)
                } else {
                    Self::get_value_recursive(value, remaining_keys)
                }
            }
            _ => None,
        }
    }
}
