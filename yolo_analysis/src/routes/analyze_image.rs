use crate::{
    detection::AnalysisResponse, error::ServiceError, model_service::ModelService,
    server::SharedState,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::instrument;

const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::ModelNotReady => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Keeps the 413 multer reports when the body limit is hit.
fn multipart_error(context: &str, error: MultipartError) -> ServiceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(error.body_text())
    } else {
        ServiceError::InvalidInput(format!("{}: {}", context, error.body_text()))
    }
}

struct Upload {
    file_name: Option<String>,
    data: Bytes,
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Option<Upload>, ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Invalid multipart request", e))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read image", e))?;
        return Ok(Some(Upload { file_name, data }));
    }

    Ok(None)
}

/// Readiness is checked before the body is touched, so callers get a 503
/// whatever they sent while the model is unavailable.
#[instrument(skip(state, multipart))]
pub async fn analyze_image<M: ModelService>(
    State(state): State<SharedState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, ServiceError> {
    if !state.detection_service.is_ready() {
        tracing::warn!(
            "Rejecting request, model state is {:?}",
            state.detection_service.readiness()
        );
        return Err(ServiceError::ModelNotReady);
    }

    let mut multipart = multipart.map_err(|e| {
        ServiceError::InvalidInput(format!("Invalid multipart request: {}", e.body_text()))
    })?;

    let upload = read_image_field(&mut multipart).await?.ok_or_else(|| {
        ServiceError::InvalidInput("No image file provided in the request.".to_string())
    })?;

    let response = state
        .detection_service
        .analyze(upload.data, upload.file_name)
        .await?;

    Ok(Json(response))
}
