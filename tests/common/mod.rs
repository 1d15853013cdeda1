//! Shared helpers: throwaway repositories and scripted upstream servers.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tempfile::TempDir;

use prompt_canvas::store::{LocalFileStorage, Repository};

pub fn temp_repository() -> (TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let repository = Repository::new(LocalFileStorage::new(dir.path().to_path_buf()));
    (dir, repository)
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: String,
}

type Responder = dyn Fn(&Method, &str) -> (StatusCode, String) + Send + Sync;

/// Upstream stand-in that answers every request through one closure and
/// records what it was sent.
#[derive(Clone)]
pub struct MockUpstream {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Method, &str) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let responder: Arc<Responder> = Arc::new(responder);
        let log = requests.clone();

        let router = Router::new().fallback(move |method: Method, uri: Uri, body: Bytes| {
            let log = log.clone();
            let responder = responder.clone();
            async move {
                let path = uri.path().to_string();
                log.lock().unwrap().push(RecordedRequest {
                    method: method.clone(),
                    path: path.clone(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
                let (status, body) = responder(&method, &path);
                let response: Response = (
                    status,
                    [(axum::http::header::CONTENT_TYPE, "application/json")],
                    body,
                )
                    .into_response();
                response
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_matching(&self, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.path.contains(fragment))
            .count()
    }
}

/// One-pixel PNG, base64 encoded.
pub const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";
