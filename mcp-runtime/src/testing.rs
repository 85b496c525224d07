//! Stub upstream servers and a manually-advanced clock for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::routing::post;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::auth::Clock;

pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }
}

impl ManualClock {
    pub fn advance_secs(&self, secs: i64) {
        *self.now.lock().unwrap() += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Binds `app` on an ephemeral port and returns its base URL.
pub(crate) async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[derive(Clone)]
pub(crate) struct RecordedCall {
    pub method: String,
    pub path_and_query: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

async fn record_call(store: &Mutex<Vec<RecordedCall>>, req: Request) {
    let (parts, body) = req.into_parts();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
    };
    let recorded = RecordedCall {
        method: parts.method.to_string(),
        path_and_query: parts
            .uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| parts.uri.path().to_string()),
        authorization: header("authorization"),
        content_type: header("content-type"),
        body: String::from_utf8_lossy(&to_bytes(body, 1 << 16).await.unwrap()).into_owned(),
    };
    store.lock().unwrap().push(recorded);
}

fn token_route(counter: Arc<AtomicUsize>, calls: Arc<Mutex<Vec<RecordedCall>>>) -> Router {
    Router::new().route(
        "/oauth/token",
        post(move |req: Request| {
            let counter = counter.clone();
            let calls = calls.clone();
            async move {
                record_call(&calls, req).await;
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                axum::Json(json!({ "access_token": format!("tok-{n}"), "expires_in": 600 }))
            }
        }),
    )
}

/// Stand-in OAuth token endpoint issuing `tok-1`, `tok-2`, ... with
/// `expires_in: 600`.
pub(crate) struct TokenStub {
    base: String,
    counter: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl TokenStub {
    pub async fn spawn() -> Self {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let base = serve(token_route(counter.clone(), calls.clone())).await;
        Self {
            base,
            counter,
            calls,
        }
    }

    pub async fn spawn_rejecting(status: u16, body: &'static str) -> Self {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route(
            "/oauth/token",
            post(move || async move { (StatusCode::from_u16(status).unwrap(), body) }),
        );
        let base = serve(app).await;
        Self {
            base,
            counter,
            calls,
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base)
    }

    /// Number of token requests served.
    pub fn requests(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RecordedToken> {
        self.calls.lock().unwrap().last().map(|call| RecordedToken {
            authorization: call.authorization.clone().unwrap_or_default(),
            content_type: call.content_type.clone().unwrap_or_default(),
            body: call.body.clone(),
        })
    }
}

pub(crate) struct RecordedToken {
    pub authorization: String,
    pub content_type: String,
    pub body: String,
}

/// Stand-in target API: serves the token endpoint plus a catch-all that
/// records every call and answers with a fixed status and body.
pub(crate) struct UpstreamStub {
    pub base: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    token_counter: Arc<AtomicUsize>,
}

impl UpstreamStub {
    pub async fn spawn(status: u16, response_body: &'static str) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let token_counter = Arc::new(AtomicUsize::new(0));
        let token_calls = Arc::new(Mutex::new(Vec::new()));
        let fallback_calls = calls.clone();
        let app = token_route(token_counter.clone(), token_calls).fallback(
            move |req: Request| {
                let calls = fallback_calls.clone();
                async move {
                    record_call(&calls, req).await;
                    (StatusCode::from_u16(status).unwrap(), response_body)
                }
            },
        );
        let base = serve(app).await;
        Self {
            base,
            calls,
            token_counter,
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base)
    }

    pub fn token_requests(&self) -> usize {
        self.token_counter.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}
