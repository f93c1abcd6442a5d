use super::*;
use tempfile::TempDir;

fn test_config(base_dir: &Path) -> Config {
    Config {
        ollama: OllamaConfig::default(),
        chunking: ChunkingConfig::default(),
        fetch: FetchConfig::default(),
        base_dir: base_dir.to_path_buf(),
    }
}

#[test]
fn defaults() {
    let config = OllamaConfig::default();
    assert_eq!(config.protocol, "http");
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 11434);
    assert_eq!(config.embedding_model, "nomic-embed-text:latest");
    assert_eq!(config.embedding_dimension, DEFAULT_EMBEDDING_DIMENSION);

    let fetch = FetchConfig::default();
    assert!(fetch.user_agent.starts_with("coldreach/"));
    assert_eq!(fetch.max_page_chars, 3000);
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.chunking, ChunkingConfig::default());
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn save_and_reload_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = test_config(temp_dir.path());
    config.ollama.generation_model = "mistral:7b".to_string();
    config.chunking.chunk_size = 500;
    config.chunking.chunk_overlap = 100;

    config.save().expect("should save config");

    let reloaded = Config::load(temp_dir.path()).expect("should reload config");
    assert_eq!(reloaded, config);
}

#[test]
fn load_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[ollama]\ngeneration_model = \"qwen2.5:14b\"\n",
    )
    .expect("should write config");

    let config = Config::load(temp_dir.path()).expect("should load config");
    assert_eq!(config.ollama.generation_model, "qwen2.5:14b");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.chunking, ChunkingConfig::default());
}

#[test]
fn validation_rejects_bad_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = test_config(temp_dir.path());
    config.ollama.protocol = "ftp".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut config = test_config(temp_dir.path());
    config.ollama.port = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidPort(0))));

    let mut config = test_config(temp_dir.path());
    config.ollama.embedding_model = "  ".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidModel(_))
    ));

    let mut config = test_config(temp_dir.path());
    config.chunking.chunk_overlap = config.chunking.chunk_size;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ChunkOverlapTooLarge(_, _))
    ));

    let mut config = test_config(temp_dir.path());
    config.fetch.max_page_chars = 10;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidPageLimit(10))
    ));
}

#[test]
fn ollama_url_formatting() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());

    let url = config.ollama_url().expect("should build url");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn derived_directories() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());

    assert_eq!(config.stores_dir(), temp_dir.path().join("stores"));
    assert_eq!(config.staging_dir(), temp_dir.path().join("staging"));
}
