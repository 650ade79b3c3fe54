//! Integration tests for the HTTP-facing adapters
//!
//! Tests cover:
//! - Page extraction (HTML rendering, plain text, failures)
//! - Model execution over an OpenAI-compatible endpoint, including retries
//! - Free-model listing through the aggregator

use std::sync::Arc;

use ai_core::OpenAiCompatConfig;
use application::{
    ApplicationError,
    ports::{
        ContentExtractorPort, CredentialPort, FreeModelCatalogPort, ModelExecutorPort, ModelPrompt,
    },
};
use domain::ModelAttempt;
use futures::StreamExt;
use infrastructure::{
    AggregatorFreeCatalog, EnvCredentials, HttpContentExtractor, RetryConfig,
    TransportModelExecutor, config::ExtractConfig,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn sse_body(pieces: &[&str]) -> String {
    let mut body = String::new();
    for piece in pieces {
        let chunk = serde_json::json!({"choices": [{"delta": {"content": piece}}]});
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn credentials() -> Arc<dyn CredentialPort> {
    Arc::new(EnvCredentials::from_values([
        ("OPENAI_API_KEY", "sk-openai"),
        ("OPENROUTER_API_KEY", "sk-router"),
    ]))
}

fn prompt() -> ModelPrompt {
    ModelPrompt {
        system: "Summarize.".to_string(),
        user: "Some page".to_string(),
        max_output_tokens: Some(300),
    }
}

fn quick_retry() -> RetryConfig {
    RetryConfig {
        initial_delay_ms: 1,
        max_delay_ms: 5,
        max_retries: 2,
        ..RetryConfig::default()
    }
    .without_jitter()
}

// ============================================================================
// Extraction
// ============================================================================

mod extractor_tests {
    use super::*;

    fn extractor() -> HttpContentExtractor {
        HttpContentExtractor::new(&ExtractConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn renders_html_and_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_raw(
                        "<html><head><title>Rust News</title></head>\
                         <body><h1>Heading</h1><p>Ownership explained.</p></body></html>",
                        "text/html; charset=utf-8",
                    ),
            )
            .mount(&server)
            .await;

        let url = format!("{}/article", server.uri());
        let content = extractor().extract(&url).await.unwrap();
        assert_eq!(content.url, url);
        assert_eq!(content.title.as_deref(), Some("Rust News"));
        assert!(content.text.contains("Ownership explained."));
        assert!(!content.text.contains("<p>"));
    }

    #[tokio::test]
    async fn plain_text_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notes.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("  just text  \n"),
            )
            .mount(&server)
            .await;

        let content = extractor()
            .extract(&format!("{}/notes.txt", server.uri()))
            .await
            .unwrap();
        assert_eq!(content.text, "just text");
        assert!(content.title.is_none());
    }

    #[tokio::test]
    async fn error_status_is_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = extractor().extract(&format!("{}/gone", server.uri())).await;
        assert!(matches!(result, Err(ApplicationError::ExternalService(_))));
    }

    #[tokio::test]
    async fn empty_page_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("   "),
            )
            .mount(&server)
            .await;

        let result = extractor().extract(&format!("{}/blank", server.uri())).await;
        assert!(matches!(result, Err(ApplicationError::ExternalService(_))));
    }
}

// ============================================================================
// Model execution
// ============================================================================

mod executor_tests {
    use super::*;

    fn executor(server: &MockServer) -> TransportModelExecutor {
        TransportModelExecutor::new(credentials(), quick_retry())
            .with_direct("openai", OpenAiCompatConfig::new(format!("{}/v1", server.uri())))
            .unwrap()
            .with_aggregator(OpenAiCompatConfig::new(format!("{}/router", server.uri())))
            .unwrap()
    }

    #[tokio::test]
    async fn direct_attempt_streams_with_provider_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-openai"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-5-mini",
                "max_tokens": 300,
                "stream": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&["Short", " summary"])))
            .expect(1)
            .mount(&server)
            .await;

        let attempt = ModelAttempt::direct("openai/gpt-5-mini", "gpt-5-mini", "OPENAI_API_KEY");
        let pieces: Vec<String> = executor(&server)
            .open_stream(&attempt, &prompt())
            .await
            .unwrap()
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(pieces, vec!["Short", " summary"]);
    }

    #[tokio::test]
    async fn aggregator_attempt_uses_aggregator_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/router/chat/completions"))
            .and(header("authorization", "Bearer sk-router"))
            .and(body_partial_json(serde_json::json!({"model": "openai/gpt-5-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&["via router"])))
            .expect(1)
            .mount(&server)
            .await;

        let attempt = ModelAttempt::aggregator(
            "openrouter/openai/gpt-5-mini",
            "openai/gpt-5-mini",
            "OPENROUTER_API_KEY",
        );
        let text = executor(&server).complete(&attempt, &prompt()).await.unwrap();
        assert_eq!(text, "via router");
    }

    #[tokio::test]
    async fn server_errors_are_retried_before_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&["recovered"])))
            .mount(&server)
            .await;

        let attempt = ModelAttempt::direct("openai/gpt-5-mini", "gpt-5-mini", "OPENAI_API_KEY");
        let text = executor(&server).complete(&attempt, &prompt()).await.unwrap();
        assert_eq!(text, "recovered");
    }

    #[tokio::test]
    async fn rejected_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
            .expect(1)
            .mount(&server)
            .await;

        let attempt = ModelAttempt::direct("openai/nope", "nope", "OPENAI_API_KEY");
        let result = executor(&server).open_stream(&attempt, &prompt()).await;
        assert!(matches!(result, Err(ApplicationError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn rate_limit_surfaces_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let attempt = ModelAttempt::direct("openai/gpt-5-mini", "gpt-5-mini", "OPENAI_API_KEY");
        let result = executor(&server).open_stream(&attempt, &prompt()).await;
        assert!(matches!(result, Err(ApplicationError::RateLimited(_))));
    }

    #[tokio::test]
    async fn empty_completion_is_empty_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&[])))
            .mount(&server)
            .await;

        let attempt = ModelAttempt::direct("openai/gpt-5-mini", "gpt-5-mini", "OPENAI_API_KEY");
        let result = executor(&server).complete(&attempt, &prompt()).await;
        assert!(matches!(result, Err(ApplicationError::EmptyOutput(_))));
    }
}

// ============================================================================
// Free-model catalog
// ============================================================================

mod catalog_tests {
    use super::*;

    #[tokio::test]
    async fn lists_only_free_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/models"))
            .and(header("authorization", "Bearer sk-router"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": "meta-llama/llama-3.3-70b:free", "pricing": {"prompt": "0", "completion": "0"}},
                    {"id": "openai/gpt-5", "pricing": {"prompt": "0.00000125", "completion": "0.00001"}},
                    {"id": "qwen/qwen3-coder", "pricing": {"prompt": "0", "completion": "0"}}
                ]
            })))
            .mount(&server)
            .await;

        let catalog = AggregatorFreeCatalog::new(
            OpenAiCompatConfig::new(format!("{}/api/v1", server.uri())),
            credentials(),
        )
        .unwrap();
        assert_eq!(
            catalog.list_free_models().await.unwrap(),
            vec!["meta-llama/llama-3.3-70b:free", "qwen/qwen3-coder"]
        );
    }

    #[tokio::test]
    async fn missing_key_is_missing_credential() {
        let catalog = AggregatorFreeCatalog::new(
            OpenAiCompatConfig::new("http://127.0.0.1:9/api/v1"),
            Arc::new(EnvCredentials::from_values(Vec::<(String, String)>::new())),
        )
        .unwrap();
        assert!(matches!(
            catalog.list_free_models().await,
            Err(ApplicationError::MissingCredential(name)) if name == "OPENROUTER_API_KEY"
        ));
    }
}
