//! Engine chain ordering, placeholder fallback and the Stability wire format.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use tokio::time::Duration;

use common::{MockUpstream, TINY_PNG_BASE64};
use prompt_canvas::availability::{AvailabilityState, ServiceAvailability};
use prompt_canvas::config::ImageProviderConfig;
use prompt_canvas::imaging::fallback::seed_for;
use prompt_canvas::imaging::{
    EngineError, FallbackImageSelector, ImageEngine, ImageGenerationClient, ImagePayload,
    SamplingParams,
};
use prompt_canvas::models::{Source, Style};
use prompt_canvas::monitor::{ExternalService, probe};

const PLACEHOLDER: &str = "https://picsum.photos";

#[derive(Clone, Copy)]
enum Outcome {
    Image,
    Status(StatusCode, &'static str),
    Empty,
}

struct ScriptedEngine {
    id: String,
    outcome: Outcome,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    fn new(id: &str, outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            outcome,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageEngine for ScriptedEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn attempt(
        &self,
        prompt: &str,
        _params: &SamplingParams,
    ) -> Result<ImagePayload, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.outcome {
            Outcome::Image => ImagePayload::from_base64(TINY_PNG_BASE64, None),
            Outcome::Status(status, body) => Err(EngineError::Status {
                status,
                body: body.to_string(),
            }),
            Outcome::Empty => Err(EngineError::NoPayload),
        }
    }
}

async fn ready_client(engines: &[Arc<ScriptedEngine>]) -> ImageGenerationClient {
    let chain: Vec<Arc<dyn ImageEngine>> = engines
        .iter()
        .map(|engine| engine.clone() as Arc<dyn ImageEngine>)
        .collect();
    let client = ImageGenerationClient::with_engines(
        chain,
        ServiceAvailability::new("scripted", Duration::ZERO),
        FallbackImageSelector::new(PLACEHOLDER),
    );
    assert_eq!(probe(&client).await, AvailabilityState::Available);
    client
}

#[tokio::test]
async fn test_first_successful_engine_wins() {
    let missing = ScriptedEngine::new("missing", Outcome::Status(StatusCode::NOT_FOUND, ""));
    let working = ScriptedEngine::new("working", Outcome::Image);
    let unused = ScriptedEngine::new("unused", Outcome::Image);
    let client = ready_client(&[missing.clone(), working.clone(), unused.clone()]).await;

    let image = client.acquire("a red fox", Style::Anime).await;

    assert_eq!(image.source, Source::External);
    assert!(image.url_or_data_uri.starts_with("data:image/png;base64,"));
    assert_eq!((missing.calls(), working.calls(), unused.calls()), (1, 1, 0));
}

#[tokio::test]
async fn test_style_descriptor_is_sent_to_engines() {
    let engine = ScriptedEngine::new("only", Outcome::Image);
    let client = ready_client(&[engine.clone()]).await;

    client.acquire("a red fox", Style::Painting).await;

    let prompts = engine.prompts.lock().unwrap().clone();
    assert_eq!(prompts, vec![Style::Painting.apply("a red fox")]);
}

#[tokio::test]
async fn test_exhausted_chain_falls_back_to_placeholder() {
    let broken = ScriptedEngine::new(
        "broken",
        Outcome::Status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
    );
    let missing = ScriptedEngine::new("missing", Outcome::Status(StatusCode::NOT_FOUND, ""));
    let client = ready_client(&[broken.clone(), missing.clone()]).await;

    let image = client.acquire("quiet harbor at dusk", Style::Realistic).await;

    assert_eq!(image.source, Source::Fallback);
    assert_eq!(
        image.url_or_data_uri,
        format!("{PLACEHOLDER}/seed/{}/512/512", seed_for("quiet harbor at dusk"))
    );
    assert_eq!((broken.calls(), missing.calls()), (1, 1));
    assert_eq!(client.availability().state(), AvailabilityState::Available);
}

#[tokio::test]
async fn test_success_without_image_stops_the_chain() {
    let empty = ScriptedEngine::new("empty", Outcome::Empty);
    let working = ScriptedEngine::new("working", Outcome::Image);
    let client = ready_client(&[empty.clone(), working.clone()]).await;

    let image = client.acquire("quiet harbor at dusk", Style::Realistic).await;

    assert_eq!(image.source, Source::Fallback);
    assert!(image.url_or_data_uri.starts_with("https://picsum.photos/seed/"));
    assert_eq!((empty.calls(), working.calls()), (1, 0));
}

#[tokio::test]
async fn test_rate_limited_chain_disables_provider() {
    let limited = ScriptedEngine::new(
        "limited",
        Outcome::Status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
    );
    let other = ScriptedEngine::new("other", Outcome::Status(StatusCode::NOT_FOUND, ""));
    let client = ready_client(&[limited.clone(), other.clone()]).await;

    let first = client.acquire("a puppy", Style::Cartoon).await;
    assert_eq!(first.source, Source::Fallback);
    assert_eq!(client.availability().state(), AvailabilityState::Unavailable);

    let second = client.acquire("a puppy", Style::Cartoon).await;
    assert_eq!(second.source, Source::Fallback);
    assert_eq!(limited.calls(), 1);
}

#[tokio::test]
async fn test_fallback_uses_unstyled_prompt_category() {
    let broken = ScriptedEngine::new("broken", Outcome::Empty);
    let client = ready_client(&[broken]).await;

    let image = client.acquire("a sleepy kitten", Style::Anime).await;

    let ids = FallbackImageSelector::category_ids("cat").unwrap();
    assert!(
        ids.iter()
            .any(|id| image.url_or_data_uri == format!("{PLACEHOLDER}/id/{id}/512/512"))
    );
}

#[tokio::test]
async fn test_unconfigured_client_uses_placeholder() {
    let client = ImageGenerationClient::new(
        &ImageProviderConfig {
            api_key: None,
            api_host: "http://127.0.0.1:9".to_string(),
            cooldown: Duration::ZERO,
        },
        FallbackImageSelector::new(PLACEHOLDER),
    )
    .unwrap();

    assert!(!client.is_configured());
    let image = client.acquire("a dog on a beach", Style::Realistic).await;
    assert_eq!(image.source, Source::Fallback);
    assert!(image.url_or_data_uri.starts_with("https://picsum.photos/id/"));
}

fn stability_upstream() -> impl Fn(&Method, &str) -> (StatusCode, String) + Send + Sync + 'static {
    |method: &Method, path: &str| {
        if *method == Method::GET && path == "/v1/engines/list" {
            (
                StatusCode::OK,
                r#"[{"id": "stable-diffusion-v1-6"}, {"id": "stable-diffusion-512-v2-1"}]"#
                    .to_string(),
            )
        } else if *method == Method::POST
            && path == "/v1/generation/stable-diffusion-512-v2-1/text-to-image"
        {
            (
                StatusCode::OK,
                format!(
                    r#"{{"artifacts": [{{"base64": "{TINY_PNG_BASE64}", "finishReason": "SUCCESS"}}]}}"#
                ),
            )
        } else {
            (StatusCode::NOT_FOUND, String::new())
        }
    }
}

#[tokio::test]
async fn test_stability_chain_over_http() {
    let upstream = MockUpstream::start(stability_upstream()).await;
    let client = ImageGenerationClient::new(
        &ImageProviderConfig {
            api_key: Some("sk-test".to_string()),
            api_host: upstream.base_url.clone(),
            cooldown: Duration::ZERO,
        },
        FallbackImageSelector::new(PLACEHOLDER),
    )
    .unwrap();

    assert_eq!(probe(&client).await, AvailabilityState::Available);
    let image = client.acquire("a lighthouse", Style::Minimalist).await;

    assert_eq!(image.source, Source::External);
    assert_eq!(
        image.url_or_data_uri,
        format!("data:image/png;base64,{TINY_PNG_BASE64}")
    );

    let posts: Vec<_> = upstream
        .requests()
        .into_iter()
        .filter(|request| request.method == Method::POST)
        .collect();
    assert_eq!(posts.len(), 2);
    assert_eq!(
        posts[0].path,
        "/v1/generation/stable-diffusion-v1-6/text-to-image"
    );
    let body: serde_json::Value = serde_json::from_str(&posts[1].body).unwrap();
    assert_eq!(body["width"], 512);
    assert_eq!(body["steps"], 30);
    assert_eq!(body["cfg_scale"], 7.0);
    assert!(
        body["text_prompts"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("a lighthouse, minimalist")
    );
}

#[tokio::test]
async fn test_stability_probe_fails_without_engines() {
    let upstream = MockUpstream::start(|_, _| (StatusCode::OK, "[]".to_string())).await;
    let client = ImageGenerationClient::new(
        &ImageProviderConfig {
            api_key: Some("sk-test".to_string()),
            api_host: upstream.base_url.clone(),
            cooldown: Duration::ZERO,
        },
        FallbackImageSelector::new(PLACEHOLDER),
    )
    .unwrap();

    assert_eq!(probe(&client).await, AvailabilityState::Unavailable);
    let image = client.acquire("a lighthouse", Style::Realistic).await;
    assert_eq!(image.source, Source::Fallback);
    assert_eq!(upstream.count_matching("text-to-image"), 0);
}

#[tokio::test]
async fn test_stability_empty_artifacts_end_the_request() {
    let upstream = MockUpstream::start(|method: &Method, path: &str| {
        if *method == Method::GET {
            (
                StatusCode::OK,
                r#"[{"id": "stable-diffusion-v1-6"}, {"id": "stable-diffusion-512-v2-1"}]"#
                    .to_string(),
            )
        } else if path == "/v1/generation/stable-diffusion-v1-6/text-to-image" {
            (StatusCode::OK, r#"{"artifacts": []}"#.to_string())
        } else {
            (
                StatusCode::OK,
                format!(r#"{{"artifacts": [{{"base64": "{TINY_PNG_BASE64}"}}]}}"#),
            )
        }
    })
    .await;
    let client = ImageGenerationClient::new(
        &ImageProviderConfig {
            api_key: Some("sk-test".to_string()),
            api_host: upstream.base_url.clone(),
            cooldown: Duration::ZERO,
        },
        FallbackImageSelector::new(PLACEHOLDER),
    )
    .unwrap();
    probe(&client).await;

    let image = client.acquire("a lighthouse", Style::Realistic).await;

    assert_eq!(image.source, Source::Fallback);
    assert_eq!(upstream.count_matching("text-to-image"), 1);
}

#[tokio::test]
async fn test_stability_probe_needs_a_chain_engine() {
    let upstream = MockUpstream::start(|_, _| {
        (
            StatusCode::OK,
            r#"[{"id": "esrgan-v1-x2plus"}, {"id": "stable-video-diffusion"}]"#.to_string(),
        )
    })
    .await;
    let client = ImageGenerationClient::new(
        &ImageProviderConfig {
            api_key: Some("sk-test".to_string()),
            api_host: upstream.base_url.clone(),
            cooldown: Duration::ZERO,
        },
        FallbackImageSelector::new(PLACEHOLDER),
    )
    .unwrap();

    assert_eq!(probe(&client).await, AvailabilityState::Unavailable);
}
