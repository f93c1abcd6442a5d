use super::*;
use crate::chunking::ChunkingConfig;
use crate::config::{FetchConfig, OllamaConfig};
use crate::ingest;
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(base_dir: &Path, ollama_uri: &str) -> Config {
    let url = Url::parse(ollama_uri).expect("mock server uri should parse");
    Config {
        ollama: OllamaConfig {
            host: url.host_str().expect("uri should have host").to_string(),
            port: url.port().expect("uri should have port"),
            ..OllamaConfig::default()
        },
        chunking: ChunkingConfig::default(),
        fetch: FetchConfig::default(),
        base_dir: base_dir.to_path_buf(),
    }
}

async fn mount_embed_mock(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0, 0.0, 0.0]]})),
        )
        .mount(server)
        .await;
}

const EXTRACTION_JSON: &str = "{\"role\": \"Senior Backend Engineer\", \
    \"experience\": \"3+ years\", \"skills\": [\"Python\", \"AWS\"], \
    \"description\": \"Own backend services\"}";

#[test]
fn url_classification() {
    assert!(is_url("http://example.com/job/123"));
    assert!(is_url("https://example.com/job/123"));
    assert!(!is_url("Senior Backend Engineer, 3+ years Python, AWS"));
    assert!(!is_url("ftp://example.com/job"));
    assert!(!is_url("example.com/job"));
}

#[test]
fn email_prompt_joins_context_in_rank_order() {
    let job_info = JobInfo::Fallback {
        description: "Backend role".to_string(),
    };
    let context = vec![
        RetrievedChunk {
            content: "best match".to_string(),
            similarity: 0.9,
        },
        RetrievedChunk {
            content: "second match".to_string(),
            similarity: 0.5,
        },
    ];

    let prompt = email_prompt(&job_info, &context);
    assert!(prompt.contains("best match\nsecond match"));
    assert!(prompt.contains("Description: Backend role"));
    assert!(prompt.contains("under 200 words"));
}

#[tokio::test]
async fn generate_from_raw_text_returns_job_info_and_email() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    let config = config_for(temp_dir.path(), &server.uri());

    mount_embed_mock(&server).await;
    // First completion call extracts, second synthesizes
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": EXTRACTION_JSON
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Dear hiring team, I build backend services in Python."
        })))
        .mount(&server)
        .await;

    // Seed the portfolio so retrieval has something to rank
    let client = crate::ollama::OllamaClient::new(&config).expect("should create client");
    let store_path = temp_dir.path().join("store");
    ingest::ingest_text(&config, &client, "Python backend services, AWS", &store_path)
        .await
        .expect("should ingest");

    let generator =
        EmailGenerator::new(&config, store_path).expect("should create generator");
    let (job_info, email) = generator
        .generate("Senior Backend Engineer, 3+ years Python, AWS")
        .await
        .expect("should generate");

    match job_info {
        JobInfo::Parsed(parsed) => assert!(parsed.role.contains("Backend Engineer")),
        JobInfo::Fallback { .. } => panic!("expected parsed job info"),
    }
    assert_eq!(email, "Dear hiring team, I build backend services in Python.");
}

#[tokio::test]
async fn generate_without_portfolio_still_produces_an_email() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    let config = config_for(temp_dir.path(), &server.uri());

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": EXTRACTION_JSON
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"response": "A generic email."})),
        )
        .mount(&server)
        .await;
    // No embed mock: a missing store means the query is never embedded

    let generator = EmailGenerator::new(&config, temp_dir.path().join("missing-store"))
        .expect("should create generator");
    let (_, email) = generator
        .generate("Senior Backend Engineer, 3+ years Python, AWS")
        .await
        .expect("should generate without portfolio");

    assert_eq!(email, "A generic email.");
}

#[tokio::test]
async fn url_input_is_fetched_before_extraction() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let page_server = MockServer::start().await;
    let ollama_server = MockServer::start().await;
    let config = config_for(temp_dir.path(), &ollama_server.uri());

    Mock::given(method("GET"))
        .and(path("/job/123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body><h1>Senior Backend Engineer</h1><p>Python and AWS.</p></body></html>",
            "text/html",
        ))
        .expect(1)
        .mount(&page_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": EXTRACTION_JSON
        })))
        .up_to_n_times(1)
        .mount(&ollama_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"response": "An email."})),
        )
        .mount(&ollama_server)
        .await;

    let generator = EmailGenerator::new(&config, temp_dir.path().join("store"))
        .expect("should create generator");
    let (job_info, _) = generator
        .generate(&format!("{}/job/123", page_server.uri()))
        .await
        .expect("should generate from URL");

    assert!(!job_info.is_fallback());
}

#[tokio::test]
async fn fetch_failure_fails_generation_before_extraction() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let page_server = MockServer::start().await;
    let ollama_server = MockServer::start().await;
    let config = config_for(temp_dir.path(), &ollama_server.uri());

    Mock::given(method("GET"))
        .and(path("/job/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&page_server)
        .await;
    // The extractor must never be invoked when the fetch fails
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ollama_server)
        .await;

    let generator = EmailGenerator::new(&config, temp_dir.path().join("store"))
        .expect("should create generator");
    let result = generator
        .generate(&format!("{}/job/404", page_server.uri()))
        .await;

    assert!(matches!(result, Err(ColdreachError::Generation(_))));
}

#[tokio::test]
async fn synthesis_failure_fails_the_whole_call() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    let config = config_for(temp_dir.path(), &server.uri());

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": EXTRACTION_JSON
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let generator = EmailGenerator::new(&config, temp_dir.path().join("store"))
        .expect("should create generator");
    let result = generator.generate("Backend Engineer role").await;

    assert!(matches!(result, Err(ColdreachError::Generation(_))));
}

#[tokio::test]
async fn cache_reuses_generators_until_invalidated() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    let config = config_for(temp_dir.path(), &server.uri());
    let store_path = temp_dir.path().join("store");

    let cache = GeneratorCache::new();
    let first = cache
        .get_or_create(&config, &store_path)
        .expect("should create generator");
    let second = cache
        .get_or_create(&config, &store_path)
        .expect("should reuse generator");
    assert!(Arc::ptr_eq(&first, &second));

    cache.invalidate(&store_path);
    let third = cache
        .get_or_create(&config, &store_path)
        .expect("should create fresh generator");
    assert!(!Arc::ptr_eq(&first, &third));

    // Different store paths never share a generator
    let other = cache
        .get_or_create(&config, &temp_dir.path().join("other"))
        .expect("should create generator");
    assert!(!Arc::ptr_eq(&third, &other));
}
