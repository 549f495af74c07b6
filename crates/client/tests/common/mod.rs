//! In-process mock of the conversion service.
//!
//! Serves `GET /`, `GET /formats`, `POST /convert` and
//! `GET /download/{name}` on an ephemeral localhost port, with scripted
//! behaviour and a record of every conversion request it received.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

/// How `POST /convert` responds.
#[derive(Debug, Clone)]
pub enum ConvertBehavior {
    Succeed {
        delay: Duration,
        download_url: String,
    },
    Fail {
        status: u16,
        body: serde_json::Value,
    },
    /// Accept the upload and never answer.
    Hang,
}

impl ConvertBehavior {
    pub fn succeed(download_url: &str) -> Self {
        Self::Succeed {
            delay: Duration::ZERO,
            download_url: download_url.to_string(),
        }
    }

    pub fn succeed_after(delay: Duration, download_url: &str) -> Self {
        Self::Succeed {
            delay,
            download_url: download_url.to_string(),
        }
    }

    pub fn fail(status: u16, body: serde_json::Value) -> Self {
        Self::Fail { status, body }
    }
}

/// How `GET /download/{name}` responds.
#[derive(Debug, Clone)]
pub enum DownloadBehavior {
    Bytes(Vec<u8>),
    NotFound,
    Empty,
    /// Send the given bytes, then abort the transfer mid-body.
    Truncated(Vec<u8>),
}

/// One `POST /convert` as seen by the service.
#[derive(Debug, Clone, Default)]
pub struct RecordedConversion {
    pub file_name: Option<String>,
    pub file_size: usize,
    pub output_format: Option<String>,
}

#[derive(Clone)]
struct MockState {
    convert: ConvertBehavior,
    download: DownloadBehavior,
    recorded: Arc<Mutex<Vec<RecordedConversion>>>,
}

pub struct MockService {
    pub base_url: String,
    recorded: Arc<Mutex<Vec<RecordedConversion>>>,
}

impl MockService {
    pub fn conversions(&self) -> Vec<RecordedConversion> {
        self.recorded.lock().unwrap().clone()
    }
}

/// Start a mock service and return its base URL.
pub async fn spawn(convert: ConvertBehavior, download: DownloadBehavior) -> MockService {
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        convert,
        download,
        recorded: recorded.clone(),
    };

    let app = Router::new()
        .route("/", get(info))
        .route("/formats", get(formats))
        .route("/convert", post(convert_file))
        .route("/download/{name}", get(download_file))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockService {
        base_url: format!("http://{addr}"),
        recorded,
    }
}

/// A base URL on which nothing is listening.
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn info() -> Json<serde_json::Value> {
    Json(json!({
        "message": "File conversion API",
        "status": "running",
        "local_ip": "127.0.0.1",
        "access_url": "http://127.0.0.1:8000",
    }))
}

async fn formats() -> Json<serde_json::Value> {
    Json(json!({
        "audio": ["mp3", "wav", "flac"],
        "video": [],
        "image": ["png", "jpg", "jpeg"],
        "document": ["pdf", "txt"],
    }))
}

async fn convert_file(State(state): State<MockState>, mut multipart: Multipart) -> Response {
    let mut seen = RecordedConversion::default();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                seen.file_name = field.file_name().map(str::to_string);
                seen.file_size = field.bytes().await.unwrap().len();
            }
            "output_format" => {
                seen.output_format = Some(field.text().await.unwrap());
            }
            _ => {}
        }
    }
    state.recorded.lock().unwrap().push(seen);

    match state.convert {
        ConvertBehavior::Succeed {
            delay,
            download_url,
        } => {
            tokio::time::sleep(delay).await;
            let filename = download_url.rsplit('/').next().unwrap_or_default().to_string();
            Json(json!({
                "success": true,
                "download_url": download_url,
                "filename": filename,
            }))
            .into_response()
        }
        ConvertBehavior::Fail { status, body } => {
            (StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
        }
        ConvertBehavior::Hang => {
            std::future::pending::<()>().await;
            StatusCode::OK.into_response()
        }
    }
}

async fn download_file(State(state): State<MockState>, Path(_name): Path<String>) -> Response {
    match state.download {
        DownloadBehavior::Bytes(bytes) => (StatusCode::OK, Bytes::from(bytes)).into_response(),
        DownloadBehavior::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "File not found" })),
        )
            .into_response(),
        DownloadBehavior::Empty => (StatusCode::OK, Bytes::new()).into_response(),
        DownloadBehavior::Truncated(bytes) => {
            let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
                Ok(Bytes::from(bytes)),
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "transfer aborted")),
            ];
            (StatusCode::OK, Body::from_stream(futures::stream::iter(chunks))).into_response()
        }
    }
}
