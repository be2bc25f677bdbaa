use std::sync::Arc;
use std::time::Duration;

use nanogen::media::{MAX_IMAGE_BYTES, MAX_REFERENCE_IMAGES};
use nanogen::{
    AspectRatio, AuthStyle, EncodedImage, ErrorKind, GatewaySource, GeminiClient, GeminiConfig,
    GenerationError, GenerationRequest, GenerationSettings, ImageBlob, ImageConfigPlacement,
    ReferenceImageSet, Resolution, StaticCredentialProvider, Target,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/v1beta/models/test-model:generateContent";

fn image_body() -> serde_json::Value {
    json!({
        "candidates": [{
            "finishReason": "STOP",
            "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "mimeType": "image/png", "data": "QQ==" } }
            ]}
        }]
    })
}

fn client(config: GeminiConfig, key: Option<&str>) -> GeminiClient {
    let credentials = match key {
        Some(key) => StaticCredentialProvider::new(key),
        None => StaticCredentialProvider::empty(),
    };
    GeminiClient::with_credentials(config.with_model("test-model"), Arc::new(credentials)).unwrap()
}

#[tokio::test]
async fn direct_call_sends_header_key_and_ordered_parts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [
                { "inlineData": { "mimeType": "image/jpeg", "data": "UkVG" } },
                { "text": "Generate an image of: a lighthouse\n\nRespond with the generated image itself, not a description of it." }
            ]}],
            "generationConfig": {
                "temperature": 0.5,
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": { "aspectRatio": "9:16", "imageSize": "4K" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(GeminiConfig::new().with_upstream(server.uri()), Some("test-key"));
    let request = GenerationRequest::new("a lighthouse")
        .with_images(vec![EncodedImage::new("image/jpeg", "UkVG")])
        .with_settings(
            GenerationSettings::new()
                .with_aspect_ratio(AspectRatio::Portrait9x16)
                .with_resolution(Resolution::FourK)
                .with_temperature(0.5),
        );

    let response = client.image().generate(&request).await.unwrap();
    assert_eq!(response.image_data, "data:image/png;base64,QQ==");
}

#[tokio::test]
async fn query_key_auth_and_flattened_config() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(query_param("key", "qk"))
        .and(body_partial_json(json!({ "generationConfig": { "imageSize": "1K" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = GeminiConfig::new()
        .with_upstream(server.uri())
        .with_auth_style(AuthStyle::QueryKey)
        .with_image_config(ImageConfigPlacement::Flattened);
    let response = client(config, Some("qk"))
        .image()
        .generate(&GenerationRequest::new("x"))
        .await
        .unwrap();
    assert_eq!(response.image_data, "data:image/png;base64,QQ==");
}

#[tokio::test]
async fn gateway_gets_bearer_token_and_reports_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("authorization", "Bearer gw-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_body())
                .insert_header("x-ratelimit-remaining", "7")
                .insert_header("x-ratelimit-limit", "10")
                .insert_header("x-ratelimit-used", "3"),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Gateways may inject auth themselves, so no API key is required.
    let config = GeminiConfig::new()
        .with_upstream("http://127.0.0.1:1")
        .with_gateway(format!("{}/", server.uri()), Some("gw-token".into()));
    let response = client(config, None)
        .image()
        .generate(&GenerationRequest::new("x"))
        .await
        .unwrap();

    let rate_limit = response.rate_limit.unwrap();
    assert_eq!((rate_limit.remaining, rate_limit.limit, rate_limit.used), (7, 10, 3));
}

#[tokio::test]
async fn gateway_env_change_applies_to_next_call() {
    let url_var = "NANOGEN_IT_GATEWAY_URL";
    let token_var = "NANOGEN_IT_GATEWAY_TOKEN";
    std::env::remove_var(url_var);
    std::env::remove_var(token_var);

    let direct = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("x-goog-api-key", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_body()))
        .expect(1)
        .mount(&direct)
        .await;

    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("authorization", "Bearer rotated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_body()))
        .expect(1)
        .mount(&gateway)
        .await;

    let config = GeminiConfig::new()
        .with_upstream(direct.uri())
        .with_gateway_source(GatewaySource::env_vars(url_var, token_var));
    let client = client(config, Some("k"));
    let request = GenerationRequest::new("x");

    client.image().generate(&request).await.unwrap();

    std::env::set_var(url_var, gateway.uri());
    std::env::set_var(token_var, "rotated");
    let second = client.image().generate(&request).await;
    std::env::remove_var(url_var);
    std::env::remove_var(token_var);

    assert_eq!(second.unwrap().image_data, "data:image/png;base64,QQ==");
}

#[tokio::test]
async fn full_reference_set_reaches_relay_intact() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "imageData": "data:image/png;base64,Qg=="
        })))
        .expect(1)
        .mount(&server)
        .await;

    let blobs = (0..MAX_REFERENCE_IMAGES)
        .map(|i| ImageBlob::new(format!("ref-{}.png", i), "image/png", vec![9u8; MAX_IMAGE_BYTES]))
        .collect();
    let mut references = ReferenceImageSet::new();
    references.admit(blobs).await.unwrap();

    let client = client(GeminiConfig::new().with_relay(server.uri()), None);
    let response = client
        .generate("a collage", &references, GenerationSettings::new())
        .await
        .unwrap();
    assert_eq!(response.image_data, "data:image/png;base64,Qg==");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let urls = body["referenceImagesBase64"].as_array().unwrap();
    assert_eq!(urls.len(), MAX_REFERENCE_IMAGES);
    assert!(urls.iter().all(|url| url.as_str().unwrap().len()
        == "data:image/png;base64,".len() + (MAX_IMAGE_BYTES + 2) / 3 * 4));
}

#[tokio::test]
async fn relay_target_posts_relay_contract() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "prompt": "a cat",
            "referenceImagesBase64": ["data:image/png;base64,QQ=="],
            "settings": { "aspectRatio": "Auto", "resolution": "2K", "temperature": 1.0 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "imageData": "data:image/png;base64,Qg==",
            "rateLimit": { "remaining": 59, "limit": 60, "used": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = GeminiConfig::new().with_relay(server.uri());
    let request = GenerationRequest::new("a cat")
        .with_images(vec![EncodedImage::new("image/png", "QQ==")])
        .with_settings(GenerationSettings::new().with_resolution(Resolution::TwoK));

    let response = client(config, None).image().generate(&request).await.unwrap();
    assert_eq!(response.image_data, "data:image/png;base64,Qg==");
    assert_eq!(response.rate_limit.unwrap().remaining, 59);
}

#[tokio::test]
async fn undeployed_relay_gets_hint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(404).set_body_raw("<!DOCTYPE html><p>Not Found</p>", "text/html"),
        )
        .mount(&server)
        .await;

    let config = GeminiConfig::new().with_relay(server.uri());
    let err = client(config, None)
        .image()
        .generate(&GenerationRequest::new("x"))
        .await
        .unwrap_err();

    match err {
        GenerationError::NonJsonResponse { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("/api/generate endpoint was not found"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn relay_error_body_keeps_its_kind() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": "Daily limit of 20 generations reached. Try again after 2026-10-20T00:00:00Z.",
            "errorCode": "RATE_LIMIT_EXCEEDED",
            "dailyLimit": 20,
            "resetTime": "2026-10-20T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let config = GeminiConfig::new().with_relay(server.uri());
    let err = client(config, None)
        .image()
        .generate(&GenerationRequest::new("x"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    assert_eq!(err.daily_limit(), Some(20));
    assert_eq!(err.reset_time(), Some("2026-10-20T00:00:00Z"));
}

#[tokio::test]
async fn upstream_429_defaults_daily_limit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "status": "RATE_LIMIT_EXCEEDED", "message": "limit" }
        })))
        .mount(&server)
        .await;

    let config = GeminiConfig::new().with_upstream(server.uri());
    let err = client(config, Some("k"))
        .image()
        .generate(&GenerationRequest::new("x"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    assert_eq!(err.daily_limit(), Some(60));
}

#[tokio::test]
async fn blank_prompt_never_reaches_the_network() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_body()))
        .expect(0)
        .mount(&server)
        .await;

    for config in [
        GeminiConfig::new().with_upstream(server.uri()),
        GeminiConfig::new().with_relay(server.uri()),
        GeminiConfig::new().with_gateway(server.uri(), None),
    ] {
        let err = client(config, Some("k"))
            .image()
            .generate(&GenerationRequest::new("   "))
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::MissingPrompt);
    }
}

#[tokio::test]
async fn direct_without_key_is_a_configuration_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_body()))
        .expect(0)
        .mount(&server)
        .await;

    let config = GeminiConfig::new().with_upstream(server.uri());
    let err = client(config, None)
        .image()
        .generate(&GenerationRequest::new("x"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert!(err.to_string().contains("Missing API Key"));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_body())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = GeminiConfig::new().with_upstream(server.uri()).with_timeout(1);
    let err = client(config, Some("k"))
        .image()
        .generate(&GenerationRequest::new("x"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn refused_connection_is_network_failure() {
    let config = GeminiConfig::new().with_upstream("http://127.0.0.1:1");
    let client = client(config, Some("k"));
    let target = Target::resolve(client.image().config());

    let err = client
        .image()
        .generate_via(&target, &GenerationRequest::new("x"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    assert!(err.to_string().contains("check your connection"));
}

#[tokio::test]
async fn safety_block_from_upstream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "IMAGE_SAFETY", "content": { "parts": [] } }]
        })))
        .mount(&server)
        .await;

    let config = GeminiConfig::new().with_upstream(server.uri());
    let err = client(config, Some("k"))
        .image()
        .generate(&GenerationRequest::new("x"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SafetyBlock);
}
