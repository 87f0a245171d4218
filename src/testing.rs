//! Helpers shared by unit tests: scripted transports and throwaway HTTP servers.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::post;
use axum::Json;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::agent::llm::ChatTransport;
use crate::agent::types::{ChatRequest, ChatResponse, Message};
use crate::error::{Result, TransportError};

/// Scripted reply of a [`FakeTransport`]
pub enum Reply {
    Answer(Message),
    Fail(&'static str),
}

/// Transport that answers from a script and records every request it sees
#[derive(Default)]
pub struct FakeTransport {
    replies: std::sync::Mutex<VecDeque<Reply>>,
    requests: std::sync::Mutex<Vec<ChatRequest>>,
}

impl FakeTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: std::sync::Mutex::new(replies.into()),
            requests: Default::default(),
        })
    }

    pub fn answering(text: &str) -> Arc<Self> {
        Self::new(vec![Reply::Answer(Message::assistant(text))])
    }

    pub fn failing() -> Arc<Self> {
        Self::new(vec![Reply::Fail("connection refused")])
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Answer(message)) => {
                let mut messages = request.messages.clone();
                messages.push(message);
                Ok(ChatResponse { messages })
            }
            Some(Reply::Fail(reason)) => Err(TransportError::Other(reason.to_string()).into()),
            None => Err(TransportError::Other("script exhausted".into()).into()),
        }
    }
}

/// Bodies and authorization headers received by [`serve_recording`]
pub struct Recorded {
    pub base_url: String,
    pub bodies: Arc<Mutex<Vec<Value>>>,
    pub headers: Arc<Mutex<Vec<Option<String>>>>,
}

#[derive(Clone)]
struct RecordState {
    status: StatusCode,
    reply: Value,
    bodies: Arc<Mutex<Vec<Value>>>,
    headers: Arc<Mutex<Vec<Option<String>>>>,
}

async fn record(
    State(state): State<RecordState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.bodies.lock().await.push(body);
    state.headers.lock().await.push(
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    (state.status, Json(state.reply))
}

/// Serve a fixed JSON reply on `path` and record what gets posted there
pub async fn serve_recording(path: &str, status: u16, reply: Value) -> Recorded {
    let state = RecordState {
        status: StatusCode::from_u16(status).unwrap(),
        reply,
        bodies: Default::default(),
        headers: Default::default(),
    };
    let recorded = Recorded {
        base_url: String::new(),
        bodies: state.bodies.clone(),
        headers: state.headers.clone(),
    };
    let app = Router::new().route(path, post(record)).with_state(state);
    Recorded {
        base_url: spawn(app).await,
        ..recorded
    }
}

/// Bind an app to an ephemeral local port and return its base URL
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Log lines written while the returned guard is alive on this thread
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Capture this thread's log output at `level` and above
pub fn capture_logs(level: tracing::Level) -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}
