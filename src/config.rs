use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {path}"))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use crate::types::Config;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "timing:\n  base_seconds: 10.0\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.timing.base_seconds, 10.0);
        // untouched sections keep their defaults
        assert_eq!(config.timing.max_green_seconds, 60.0);
        assert_eq!(config.driver.tick_interval_secs, 1.0);
        assert_eq!(config.logging.level, "info");
    }
}
