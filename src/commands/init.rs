use crate::config::{CONFIG_FILE_NAMES, DEFAULT_CONFIG_TEMPLATE};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Write the default configuration into `dir`.
pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE_NAMES[0]);

    if config_path.exists() && !force {
        anyhow::bail!("Configuration file already exists. Use --force to overwrite.");
    }

    fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("cannot write {}", config_path.display()))?;
    println!("Created {} configuration file", CONFIG_FILE_NAMES[0]);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        init_config(dir.path(), false).unwrap();
        assert!(init_config(dir.path(), false).is_err());
        init_config(dir.path(), true).unwrap();

        let written = fs::read_to_string(dir.path().join(".riskmap.toml")).unwrap();
        assert_eq!(written, DEFAULT_CONFIG_TEMPLATE);
    }
}
