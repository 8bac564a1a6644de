use std::collections::BTreeSet;

use crate::pathed::extension_of;

/// Extension used to recognise zip containers.
pub const CONTAINER_EXTENSION: &str = "zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Document,
    Container,
    Unsupported,
}

/// Allowed extension set, compared case-insensitively.
#[derive(Debug, Clone)]
pub struct ExtensionPolicy {
    allowed: BTreeSet<String>,
}

impl ExtensionPolicy {
    #[must_use]
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { allowed }
    }

    #[must_use]
    pub fn from_config(config: &intake_core::config::IngestConfig) -> Self {
        Self::new(&config.allowed_extensions)
    }

    #[must_use]
    pub fn classify(&self, name: &str) -> FileClass {
        match extension_of(name) {
            Some(ext) if !self.allowed.contains(&ext) => FileClass::Unsupported,
            Some(ext) if ext == CONTAINER_EXTENSION => FileClass::Container,
            Some(_) => FileClass::Document,
            None => FileClass::Unsupported,
        }
    }

    #[must_use]
    pub fn is_allowed(&self, name: &str) -> bool {
        self.classify(name) != FileClass::Unsupported
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

impl Default for ExtensionPolicy {
    fn default() -> Self {
        Self::from_config(&intake_core::config::IngestConfig::default())
    }
}
