//! HTTP Server for the tabclean API.
//!
//! The UI shell uploads files here, renders the returned previews and
//! charts, and asks for the converted file when the user clicks download.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                                   |
//! |--------|-------------------|-----------------------------------------------|
//! | GET    | `/health`         | Health check                                  |
//! | POST   | `/api/preview`    | Run the pipeline on one or more files         |
//! | POST   | `/api/export`     | Run the pipeline on one file and download it  |
//! | GET    | `/api/logs`       | SSE stream for real-time logs                 |
//!
//! Both POST endpoints take `multipart/form-data` with one or more `file`
//! fields and an optional `request` field holding a JSON
//! [`ConversionRequest`].

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::future::join_all;
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, FileReport, PreviewResponse};
use crate::config::Settings;
use crate::error::{PipelineError, SelectionError, ServerError};
use crate::models::ConversionRequest;
use crate::transform::pipeline::{convert, run_pipeline, PipelineOptions, UploadedFile};

/// Shared, read-only server state
#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
}

impl AppState {
    fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            preview_rows: self.settings.preview_rows,
            ..Default::default()
        }
    }
}

/// Build the router
pub fn router(settings: Settings) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let body_limit = settings.max_upload_bytes;
    let state = AppState {
        settings: Arc::new(settings),
    };

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/preview", post(preview_files))
        .route("/api/export", post(export_file))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let app = router(settings);

    println!("🚀 tabclean server running on http://{}", addr);
    println!("   POST /api/preview - Upload files, get previews");
    println!("   POST /api/export  - Upload a file, download the conversion");
    println!("   GET  /api/logs    - SSE log stream");
    println!("   GET  /health      - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log_info(format!("Listening on {}", addr));
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tabclean",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "preview": "POST /api/preview",
            "export": "POST /api/export",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Preview endpoint: every file runs independently on the blocking pool
async fn preview_files(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PreviewResponse>, ServerError> {
    let (files, request) = read_upload(multipart).await?;
    print_banner("NEW UPLOAD", &files);

    let options = state.pipeline_options();
    let tasks = files.into_iter().map(|file| {
        let request = request.clone();
        let options = options.clone();
        let name = file.name.clone();
        let handle = tokio::task::spawn_blocking(move || {
            run_pipeline(&file.name, &file.bytes, &request, &options)
        });
        async move {
            match handle.await {
                Ok(result) => FileReport::from_result(name, result),
                Err(e) => FileReport::failed(name, format!("Worker failed: {}", e)),
            }
        }
    });

    let reports = join_all(tasks).await;
    Ok(Json(PreviewResponse::new(reports)))
}

/// Export endpoint: returns the converted file as an attachment
async fn export_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let (mut files, request) = read_upload(multipart).await?;
    if files.len() != 1 {
        return Err(ServerError::BadRequest(format!(
            "Export takes exactly one file, got {}",
            files.len()
        )));
    }
    let file = files.remove(0);
    print_banner("EXPORT", std::slice::from_ref(&file));

    let options = state.pipeline_options();
    let conversion = tokio::task::spawn_blocking(move || {
        convert(&file.name, &file.bytes, &request, &options)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Worker failed: {}", e)))??;

    let export = conversion.export;
    let headers = [
        (header::CONTENT_TYPE, export.mime_type.to_string()),
        (header::CONTENT_DISPOSITION, content_disposition(&export.file_name)),
    ];
    Ok((headers, export.bytes).into_response())
}

/// Collect `file` fields and the optional `request` JSON field.
async fn read_upload(
    mut multipart: Multipart,
) -> Result<(Vec<UploadedFile>, ConversionRequest), ServerError> {
    let mut files = Vec::new();
    let mut request = ConversionRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                files.push(UploadedFile::new(file_name, bytes.to_vec()));
            }
            "request" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                request = serde_json::from_str(&text)
                    .map_err(|e| ServerError::BadRequest(format!("Invalid request JSON: {}", e)))?;
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(ServerError::BadRequest("No file provided".to_string()));
    }

    Ok((files, request))
}

fn print_banner(title: &str, files: &[UploadedFile]) {
    println!("\n{}", "=".repeat(70));
    for file in files {
        println!("📄 {}: {} ({} bytes)", title, file.name, file.bytes.len());
    }
    println!("{}\n", "=".repeat(70));
}

/// `attachment` header value with a quoted, ASCII-only file name.
pub fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// HTTP status for a server error.
pub fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(
            PipelineError::Parse(_)
            | PipelineError::Selection(SelectionError::UnknownColumns(_)),
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pipeline(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        log_error(self.to_string());
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}
