use std::io::Write;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 13] = [
    "INTAKE_PROCESSOR_URL",
    "INTAKE_PROCESSOR_ENDPOINT",
    "INTAKE_PROCESSOR_DPI",
    "INTAKE_PROCESSOR_LANGS",
    "INTAKE_PROCESSOR_SUMMARIZE",
    "INTAKE_PROCESSOR_MODEL",
    "INTAKE_PROCESSOR_TIMEOUT",
    "INTAKE_ALLOWED_EXTENSIONS",
    "INTAKE_MAX_SIZE_MB",
    "INTAKE_CONCURRENCY",
    "INTAKE_DEFAULT_CATEGORY",
    "INTAKE_CATALOG_URL",
    "INTAKE_LOG_LEVEL",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn defaults_match_processing_service() {
    let config = Config::default();
    assert_eq!(config.processor.base_url, "http://127.0.0.1:4000");
    assert_eq!(config.processor.endpoint, "/ocr/tesseract");
    assert_eq!(config.processor.dpi, 300);
    assert_eq!(config.processor.prep, "adaptive");
    assert_eq!(config.processor.langs, "kor+eng");
    assert_eq!(config.processor.psm, 6);
    assert!(config.processor.summarize);
    assert_eq!(config.processor.summary_model, "gemma3-summarizer");
    assert!(config.processor.timeout_secs.is_none());
    assert_eq!(config.ingest.max_size_mb, 80);
    assert!(config.ingest.allowed_extensions.contains(&"zip".to_owned()));
    assert!(config.ingest.allowed_extensions.contains(&"pdf".to_owned()));
    assert_eq!(config.upload.concurrency, 10);
    assert_eq!(config.upload.default_category, "Uncategorized");
    assert_eq!(config.catalog.page_size, 20);
    assert_eq!(config.log.level, "info");
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.upload.concurrency, 10);
}

#[test]
#[serial]
fn parse_partial_toml_keeps_section_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("intake.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"
[processor]
base_url = "http://ocr.internal:9000"
summarize = false

[ingest]
allowed_extensions = ["pdf", "zip"]
max_size_mb = 10

[upload]
concurrency = 3
"#
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.processor.base_url, "http://ocr.internal:9000");
    assert!(!config.processor.summarize);
    assert_eq!(config.processor.dpi, 300);
    assert_eq!(config.ingest.allowed_extensions, vec!["pdf", "zip"]);
    assert_eq!(config.ingest.max_size_mb, 10);
    assert_eq!(config.ingest.max_walk_depth, 64);
    assert_eq!(config.upload.concurrency, 3);
    assert_eq!(config.upload.default_category, "Uncategorized");
    assert_eq!(config.catalog.base_url, "http://127.0.0.1:4000");
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[upload\nconcurrency = ").unwrap();
    assert!(Config::load(&path).is_err());
}

#[test]
#[serial]
fn env_overrides_apply() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("INTAKE_PROCESSOR_URL", "http://env:1234");
        std::env::set_var("INTAKE_MAX_SIZE_MB", "5");
        std::env::set_var("INTAKE_CONCURRENCY", "2");
        std::env::set_var("INTAKE_ALLOWED_EXTENSIONS", "pdf, docx ,");
        std::env::set_var("INTAKE_PROCESSOR_TIMEOUT", "120");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.processor.base_url, "http://env:1234");
    assert_eq!(config.ingest.max_size_mb, 5);
    assert_eq!(config.upload.concurrency, 2);
    assert_eq!(config.ingest.allowed_extensions, vec!["pdf", "docx"]);
    assert_eq!(config.processor.timeout_secs, Some(120));
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("INTAKE_CONCURRENCY", "0");
        std::env::set_var("INTAKE_MAX_SIZE_MB", "lots");
        std::env::set_var("INTAKE_ALLOWED_EXTENSIONS", " , ");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.upload.concurrency, 10);
    assert_eq!(config.ingest.max_size_mb, 80);
    assert!(!config.ingest.allowed_extensions.is_empty());
}

#[test]
fn validate_accepts_defaults() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn validate_rejects_zero_concurrency() {
    let mut config = Config::default();
    config.upload.concurrency = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("upload.concurrency"));
}

#[test]
fn validate_rejects_blank_extensions() {
    let mut config = Config::default();
    config.ingest.allowed_extensions = vec![".".into(), "  ".into()];
    assert!(config.validate().is_err());
}

#[test]
fn shipped_default_config_matches_defaults() {
    let shipped: Config = toml::from_str(include_str!("../../../../config/default.toml")).unwrap();
    let defaults = Config::default();
    assert_eq!(
        toml::to_string(&shipped).unwrap(),
        toml::to_string(&defaults).unwrap()
    );
}
