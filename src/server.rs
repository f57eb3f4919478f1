//! Upload / preview / download HTTP server (`pdf2html --serve`).
//!
//! Routes:
//! - `GET /` upload form
//! - `POST /convert` multipart upload (field `file`) → result page with
//!   summary, sandboxed preview and download link, or an error page
//! - `POST /api/convert` raw PDF body → the generated HTML as a
//!   `converted_datasheet.html` attachment, or the error message as text
//! - `GET /health` → `ok`
//!
//! Each request runs its own pipeline; the only shared state is the
//! read-only [`ConversionConfig`].

use crate::config::ConversionConfig;
use crate::convert::convert_bytes;
use crate::error::{ErrorKind, Pdf2HtmlError};
use crate::present::{escape_text, HtmlArtifact, DOWNLOAD_FILE_NAME};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Default request body limit: 64 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub struct ServerState {
    config: ConversionConfig,
}

impl ServerState {
    pub fn new(config: ConversionConfig) -> Arc<Self> {
        Arc::new(Self { config })
    }
}

/// Build the application router.
pub fn router(state: Arc<ServerState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/convert", post(convert_form_handler))
        .route("/api/convert", post(convert_api_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Serve on an already-bound listener until Ctrl-C.
pub async fn serve_listener(
    listener: TcpListener,
    config: ConversionConfig,
    max_upload_bytes: usize,
) -> Result<(), Pdf2HtmlError> {
    let app = router(ServerState::new(config), max_upload_bytes);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| Pdf2HtmlError::Internal(format!("HTTP server failed: {e}")))
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(
    addr: SocketAddr,
    config: ConversionConfig,
    max_upload_bytes: usize,
) -> Result<(), Pdf2HtmlError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Pdf2HtmlError::Internal(format!("Cannot bind {addr}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| Pdf2HtmlError::Internal(format!("Cannot read bound address: {e}")))?;
    info!("Listening on http://{}", local);
    serve_listener(listener, config, max_upload_bytes).await
}

/// HTTP status for a fatal conversion error.
pub fn status_for(err: &Pdf2HtmlError) -> StatusCode {
    match err.kind() {
        ErrorKind::Input => StatusCode::BAD_REQUEST,
        ErrorKind::Generation => StatusCode::BAD_GATEWAY,
        ErrorKind::Output | ErrorKind::Config | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn index_handler() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

async fn convert_form_handler(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<(String, Bytes)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let name = field.file_name().unwrap_or("upload.pdf").to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((name, bytes)),
                    Err(e) => return error_page(StatusCode::BAD_REQUEST, &e.body_text()),
                }
                break;
            }
            Ok(None) => break,
            Err(e) => return error_page(StatusCode::BAD_REQUEST, &e.body_text()),
        }
    }

    let Some((name, bytes)) = upload else {
        return error_page(StatusCode::BAD_REQUEST, "Please choose a PDF file to upload.");
    };
    info!("Upload received: {} ({} bytes)", name, bytes.len());

    let config = &state.config;
    match convert_bytes(name, bytes.to_vec(), config).await {
        Ok(output) => {
            let summary = output.extraction_summary();
            let artifact = HtmlArtifact::new(output.html);
            Html(artifact.preview_page(
                &summary,
                config.preview_height,
                config.strip_preview_scripts,
            ))
            .into_response()
        }
        Err(e) => {
            warn!("Conversion failed: {}", e);
            error_page(status_for(&e), &e.user_message())
        }
    }
}

async fn convert_api_handler(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    match convert_bytes("request body", body.to_vec(), &state.config).await {
        Ok(output) => {
            let headers = [
                (CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME),
                ),
            ];
            (StatusCode::OK, headers, output.html).into_response()
        }
        Err(e) => {
            warn!("Conversion failed: {}", e);
            (
                status_for(&e),
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                e.user_message(),
            )
                .into_response()
        }
    }
}

fn error_page(status: StatusCode, message: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Conversion failed</title></head>\
         <body style=\"font-family: system-ui, sans-serif; margin: 24px;\">\
         <h1>Conversion failed</h1><pre style=\"white-space: pre-wrap; color: #b71c1c;\">{}</pre>\
         <p><a href=\"/\">Try another file</a></p></body></html>\n",
        escape_text(message)
    );
    (status, Html(body)).into_response()
}

const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>AI PDF → Structured HTML Converter</title>
</head>
<body style="font-family: system-ui, sans-serif; margin: 24px;">
<h1>AI-Powered PDF → Structured HTML Converter</h1>
<form action="/convert" method="post" enctype="multipart/form-data">
<p><label>Upload a PDF file <input type="file" name="file" accept="application/pdf,.pdf" required></label></p>
<p><button type="submit">Convert</button></p>
</form>
</body>
</html>
"#;
