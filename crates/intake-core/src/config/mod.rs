mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.upload.concurrency == 0 {
            bail!("upload.concurrency must be at least 1");
        }
        if self.ingest.max_size_mb == 0 {
            bail!("ingest.max_size_mb must be at least 1");
        }
        if self.ingest.entry_batch_size == 0 {
            bail!("ingest.entry_batch_size must be at least 1");
        }
        if self
            .ingest
            .allowed_extensions
            .iter()
            .all(|e| e.trim().trim_start_matches('.').is_empty())
        {
            bail!("ingest.allowed_extensions must not be empty");
        }
        if self.catalog.page_size == 0 {
            bail!("catalog.page_size must be at least 1");
        }
        Ok(())
    }
}
