// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! HTTP surface: an upload form, the upload endpoint and artifact retrieval.
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/` | GET | Upload form |
//! | `/` | POST | Multipart upload (field `file`), redirects to the artifact |
//! | `/uploads/{filename}` | GET | Stored artifact bytes |
//! | `/health` | GET | Liveness |
//! | `/swagger-ui` | GET | OpenAPI docs |

use std::fmt::Write;
use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::get,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::{AnnotateError, Result};
use crate::io::Workspace;
use crate::model::PoseRuntime;
use crate::pipeline::{Annotation, Pipeline, UploadRequest};
use crate::validate::ImageFormat;

/// Largest accepted request body.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "file";

const UPLOAD_FORM: &str = r#"<!doctype html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Upload Image for Pose Estimation</title>
</head>
<body>
    <h1>Upload Image for Pose Estimation</h1>
    <form method="post" enctype="multipart/form-data">
        <input type="file" name="file" accept=".png,.jpg,.jpeg">
        <input type="submit" value="Upload">
    </form>
</body>
</html>
"#;

/// The part of a [`Pipeline`] the HTTP layer needs, without its runtime
/// type parameter.
pub trait Annotator: Send + Sync {
    /// Keep and annotate an upload.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    fn submit(&self, request: &UploadRequest) -> Result<Annotation>;

    /// Storage the artifacts live in.
    fn workspace(&self) -> &Workspace;
}

impl<R: PoseRuntime> Annotator for Pipeline<R> {
    fn submit(&self, request: &UploadRequest) -> Result<Annotation> {
        Self::submit(self, request)
    }

    fn workspace(&self) -> &Workspace {
        Self::workspace(self)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    annotator: Arc<dyn Annotator>,
}

impl AppState {
    /// Wrap a pipeline for serving.
    pub fn new<A: Annotator + 'static>(annotator: A) -> Self {
        Self {
            annotator: Arc::new(annotator),
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    /// Error message
    error: String,
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// Server status
    status: String,
    /// API version
    version: String,
}

/// A pipeline error rendered as a JSON response.
struct ApiError(AnnotateError);

impl From<AnnotateError> for ApiError {
    fn from(err: AnnotateError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AnnotateError::NotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pose Annotation Server",
        description = "Upload a PNG or JPEG, get it back with the detected human pose drawn on.\n\nAnnotated images are stored under the upload's filename and served from `/uploads/{filename}`.",
        version = "0.1.0",
        license(name = "AGPL-3.0", url = "https://github.com/ultralytics/inference/blob/main/LICENSE")
    ),
    paths(index, upload, uploaded_file, health),
    components(schemas(ErrorResponse, HealthResponse)),
    tags(
        (name = "annotate", description = "Pose annotation endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
struct ApiDoc;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(upload))
        .route("/uploads/{filename}", get(uploaded_file))
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns `Io` if the address cannot be bound or the server fails.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!(%local, "server listening");
    tracing::info!("swagger UI available at http://{local}/swagger-ui/");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;
    Ok(())
}

/// Upload form
#[utoipa::path(
    get,
    path = "/",
    tag = "annotate",
    responses(
        (status = 200, description = "HTML upload form", body = String, content_type = "text/html")
    )
)]
async fn index() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

/// Upload an image for annotation
///
/// The image is saved, annotated and stored under its own filename, then
/// the client is redirected to the artifact. A request without a `file`
/// field or with an empty filename is redirected back to the form.
#[utoipa::path(
    post,
    path = "/",
    tag = "annotate",
    request_body(content_type = "multipart/form-data", description = "Image in field `file` (png, jpg, jpeg)"),
    responses(
        (status = 303, description = "Redirect to /uploads/{filename}, or back to / when no file was sent"),
        (status = 400, description = "Unsupported format, bad filename or undecodable image", body = ErrorResponse),
        (status = 500, description = "Inference or storage failure", body = ErrorResponse)
    )
)]
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Redirect, Response> {
    let mut request = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                let body = Json(ErrorResponse {
                    error: format!("Invalid multipart body: {e}"),
                });
                return Err((StatusCode::BAD_REQUEST, body).into_response());
            }
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            let body = Json(ErrorResponse {
                error: format!("Failed to read field: {e}"),
            });
            (StatusCode::BAD_REQUEST, body).into_response()
        })?;
        request = Some(UploadRequest::new(filename, bytes.to_vec()));
        break;
    }

    let Some(request) = request.filter(|r| !r.filename.is_empty()) else {
        tracing::debug!("no file in upload, back to form");
        return Ok(Redirect::to("/"));
    };

    let annotator = Arc::clone(&state.annotator);
    let filename = request.filename.clone();
    let outcome = tokio::task::spawn_blocking(move || annotator.submit(&request))
        .await
        .map_err(|e| {
            ApiError(AnnotateError::InferenceError(format!("Worker failed: {e}"))).into_response()
        })?;

    match outcome {
        Ok(_) => Ok(Redirect::to(&artifact_url(&filename))),
        Err(e) => Err(ApiError(e).into_response()),
    }
}

/// Retrieve an annotated image
#[utoipa::path(
    get,
    path = "/uploads/{filename}",
    tag = "annotate",
    params(("filename" = String, Path, description = "Filename of the original upload")),
    responses(
        (status = 200, description = "Annotated image bytes"),
        (status = 400, description = "Invalid filename", body = ErrorResponse),
        (status = 404, description = "No artifact under that name", body = ErrorResponse)
    )
)]
async fn uploaded_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let bytes = state.annotator.workspace().outputs().retrieve(&filename)?;
    let content_type = ImageFormat::from_filename(&filename)
        .map_or("application/octet-stream", ImageFormat::content_type);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
    })
}

/// `/uploads/` URL for a filename, percent-encoding everything outside the
/// unreserved set.
fn artifact_url(filename: &str) -> String {
    let mut url = String::from("/uploads/");
    for b in filename.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            url.push(char::from(b));
        } else {
            let _ = write!(url, "%{b:02X}");
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::RenderConfig;
    use crate::detect::PoseDetector;
    use crate::model::PoseContext;
    use crate::results::Landmark;
    use crate::visualizer::{COCO, Topology};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-POSE-BOUNDARY";

    #[derive(Clone, Copy)]
    struct Fake;

    impl PoseRuntime for Fake {
        type Context = Self;

        fn open(&self) -> Result<Self> {
            Ok(Self)
        }

        fn topology(&self) -> &'static Topology {
            &COCO
        }
    }

    impl PoseContext for Fake {
        fn infer(&mut self, _pixels: &[u8], _w: u32, _h: u32) -> Result<Option<Vec<Landmark>>> {
            Ok(Some(vec![Landmark::new(0.5, 0.5, 1.0); 17]))
        }
    }

    fn app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::bootstrap(dir.path()).unwrap();
        let pipeline = Pipeline::new(PoseDetector::new(Fake), workspace, RenderConfig::default());
        (dir, router(AppState::new(pipeline)))
    }

    fn png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(16, 12, image::Rgb([30, 60, 90]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png).unwrap();
        bytes
    }

    fn multipart(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_index_serves_form() {
        let (_dir, app) = app();
        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains(r#"name="file""#));
    }

    #[tokio::test]
    async fn test_upload_redirects_to_artifact() {
        let (_dir, app) = app();
        let response = app.clone().oneshot(multipart("file", "person.png", &png())).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/uploads/person.png");

        let response = app.oneshot(get("/uploads/person.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let decoded = image::load_from_memory(&body).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 12));
    }

    #[tokio::test]
    async fn test_missing_file_field_returns_to_form() {
        let (_dir, app) = app();
        let response = app.oneshot(multipart("other", "person.png", &png())).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_empty_filename_returns_to_form() {
        let (_dir, app) = app();
        let response = app.oneshot(multipart("file", "", b"")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_unsupported_format_is_bad_request() {
        let (_dir, app) = app();
        let response = app.oneshot(multipart("file", "notes.txt", &png())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_corrupt_image_is_bad_request_and_not_stored() {
        let (_dir, app) = app();
        let response = app.clone().oneshot(multipart("file", "corrupt.jpg", b"")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get("/uploads/corrupt.jpg")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_artifact_is_not_found() {
        let (_dir, app) = app();
        let response = app.oneshot(get("/uploads/never.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = app();
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_artifact_url_encoding() {
        assert_eq!(artifact_url("person.jpg"), "/uploads/person.jpg");
        assert_eq!(artifact_url("my photo#1.png"), "/uploads/my%20photo%231.png");
        assert_eq!(artifact_url("é.jpg"), "/uploads/%C3%A9.jpg");
    }
}
