//! HTTP surface: the lyrics endpoint and the credential management pages.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    serve, Json, Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::engines::whisper::WhisperEngine;
use crate::pipeline::{Pipeline, PipelineError};
use crate::storage::{FirebaseBucket, StorageHandle};

// App state
pub struct AppState {
    pipeline: Pipeline<WhisperEngine>,
    storage: StorageHandle,
    bucket: String,
    key_path: PathBuf,
}

impl AppState {
    pub fn new(
        pipeline: Pipeline<WhisperEngine>,
        storage: StorageHandle,
        bucket: String,
        key_path: PathBuf,
    ) -> Self {
        Self {
            pipeline,
            storage,
            bucket,
            key_path,
        }
    }
}

// Request structs
#[derive(Deserialize)]
struct LyricsRequest {
    vocal_url: Option<String>,
}

// Response structs
#[derive(Serialize)]
struct LyricsResponse {
    lyrics: String,
    lines: Vec<String>,
}

fn error_detail(status: StatusCode, detail: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": detail })))
}

fn pipeline_error_response(err: PipelineError) -> (StatusCode, Json<Value>) {
    let status = match err {
        PipelineError::BadReference(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_detail(status, &err.to_string())
}

async fn extract_lyrics(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LyricsRequest>,
) -> Result<Json<LyricsResponse>, (StatusCode, Json<Value>)> {
    let vocal_url = request
        .vocal_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| error_detail(StatusCode::BAD_REQUEST, "vocal_url is required"))?;

    let worker = state.clone();
    let transcript =
        tokio::task::spawn_blocking(move || worker.pipeline.extract_lyrics(&vocal_url))
            .await
            .map_err(|err| {
                error_detail(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("pipeline task failed: {err}"),
                )
            })?
            .map_err(pipeline_error_response)?;

    Ok(Json(LyricsResponse {
        lyrics: transcript.text,
        lines: transcript.lines,
    }))
}

async fn credential_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let key_status = match tokio::fs::read_to_string(&state.key_path).await {
        Ok(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(key) => {
                let project = key
                    .get("project_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                format!("service account key installed (project: {project})")
            }
            Err(_) => "service account key present but not valid JSON".to_string(),
        },
        Err(_) => "no service account key installed".to_string(),
    };

    Html(format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><title>vocalscribe</title></head>\n\
         <body>\n\
         <h1>vocalscribe</h1>\n\
         <p>bucket: {}</p>\n\
         <p>{}</p>\n\
         <form action=\"/upload_firebase_key\" method=\"post\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"firebase_key\" accept=\".json\">\n\
         <button type=\"submit\">Upload service account key</button>\n\
         </form>\n\
         </body>\n\
         </html>\n",
        state.bucket, key_status
    ))
}

async fn upload_firebase_key(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error_detail(
            StatusCode::BAD_REQUEST,
            &format!("invalid upload body: {err}"),
        )
    })? {
        if field.name() != Some("firebase_key") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.ends_with(".json") {
            return Err(error_detail(
                StatusCode::BAD_REQUEST,
                "only JSON service account keys are accepted",
            ));
        }

        let data = field.bytes().await.map_err(|err| {
            error_detail(
                StatusCode::BAD_REQUEST,
                &format!("failed to read upload: {err}"),
            )
        })?;

        let key_path = state.key_path.clone();
        let bucket = state.bucket.clone();
        let store = tokio::task::spawn_blocking(move || {
            if let Some(parent) = key_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            std::fs::write(&key_path, &data).map_err(|e| e.to_string())?;
            FirebaseBucket::from_key_file(&bucket, &key_path).map_err(|e| e.to_string())
        })
        .await
        .map_err(|err| {
            error_detail(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("upload task failed: {err}"),
            )
        })?
        .map_err(|err| error_detail(StatusCode::INTERNAL_SERVER_ERROR, &err))?;

        state.storage.rebind(Arc::new(store));
        info!("service account key updated, storage client rebound");

        return Ok(Json(json!({ "message": "service account key installed" })));
    }

    Err(error_detail(
        StatusCode::BAD_REQUEST,
        "firebase_key field is required",
    ))
}

pub struct Server {
    state: Arc<AppState>,
    addr: SocketAddr,
}

impl Server {
    pub fn new(state: Arc<AppState>, addr: SocketAddr) -> Self {
        Server { state, addr }
    }

    pub async fn start(self) -> Result<(), std::io::Error> {
        let app = Router::new()
            .route("/", get(credential_page))
            .route("/lyrics", post(extract_lyrics))
            .route("/upload_firebase_key", post(upload_firebase_key))
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        info!("starting server on {}", self.addr);

        serve(
            TcpListener::bind(self.addr).await?,
            app.into_make_service(),
        )
        .await
    }
}

// # Extract lyrics for a stored vocal stem
// curl -X POST http://localhost:8000/lyrics \
//   -H 'Content-Type: application/json' \
//   -d '{"vocal_url": "https://firebasestorage.googleapis.com/v0/b/bucket/o/vocals%2Fabc123_vocals.mp3?alt=media&token=x"}'

// # Rotate the service account key
// curl -X POST http://localhost:8000/upload_firebase_key \
//   -F 'firebase_key=@key.json'
