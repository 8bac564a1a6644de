use super::Config;

fn parse_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("INTAKE_PROCESSOR_URL") {
            self.processor.base_url = v;
        }
        if let Ok(v) = std::env::var("INTAKE_PROCESSOR_ENDPOINT") {
            self.processor.endpoint = v;
        }
        if let Ok(v) = std::env::var("INTAKE_PROCESSOR_DPI")
            && let Ok(dpi) = v.parse::<u32>()
        {
            self.processor.dpi = dpi;
        }
        if let Ok(v) = std::env::var("INTAKE_PROCESSOR_LANGS") {
            self.processor.langs = v;
        }
        if let Ok(v) = std::env::var("INTAKE_PROCESSOR_SUMMARIZE")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.processor.summarize = enabled;
        }
        if let Ok(v) = std::env::var("INTAKE_PROCESSOR_MODEL") {
            self.processor.summary_model = v;
        }
        if let Ok(v) = std::env::var("INTAKE_PROCESSOR_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.processor.timeout_secs = (secs > 0).then_some(secs);
        }
        if let Ok(v) = std::env::var("INTAKE_ALLOWED_EXTENSIONS") {
            let list = parse_list(&v);
            if list.is_empty() {
                tracing::warn!("ignoring empty INTAKE_ALLOWED_EXTENSIONS");
            } else {
                self.ingest.allowed_extensions = list;
            }
        }
        if let Ok(v) = std::env::var("INTAKE_MAX_SIZE_MB")
            && let Ok(mb) = v.parse::<u64>()
        {
            self.ingest.max_size_mb = mb;
        }
        if let Ok(v) = std::env::var("INTAKE_CONCURRENCY") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => self.upload.concurrency = n,
                _ => tracing::warn!("ignoring invalid INTAKE_CONCURRENCY value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("INTAKE_DEFAULT_CATEGORY") {
            self.upload.default_category = v;
        }
        if let Ok(v) = std::env::var("INTAKE_CATALOG_URL") {
            self.catalog.base_url = v;
        }
        if let Ok(v) = std::env::var("INTAKE_LOG_LEVEL") {
            self.log.level = v;
        }
    }
}
