use actix_web::{http::StatusCode, web, HttpResponse};
use uuid::Uuid;

use crate::error::GenerationError;
use crate::gemini::Target;
use crate::models::{EncodedImage, GenerationRequest, RelayErrorBody, RelayRequest};
use crate::server::RelayState;

pub async fn generate(state: web::Data<RelayState>, body: web::Bytes) -> HttpResponse {
    let request_id = Uuid::new_v4();

    let relay: RelayRequest = match serde_json::from_slice(&body) {
        Ok(relay) => relay,
        Err(e) => {
            log::warn!("[req:{}] Invalid request body: {}", request_id, e);
            let err = GenerationError::Unknown(format!("Invalid request body: {}", e));
            return error_response_with_status(StatusCode::BAD_REQUEST, &err);
        }
    };

    let submitted = relay.reference_images_base64.len();
    let images: Vec<EncodedImage> = relay
        .reference_images_base64
        .iter()
        .filter_map(|url| EncodedImage::from_data_url(url))
        .collect();
    if images.len() < submitted {
        log::warn!(
            "[req:{}] Skipped {} malformed reference image(s)",
            request_id,
            submitted - images.len()
        );
    }

    log::info!(
        "[req:{}] Generate request: {} chars, {} image(s), {:?}",
        request_id,
        relay.prompt.len(),
        images.len(),
        relay.settings
    );

    let request = GenerationRequest::new(relay.prompt)
        .with_images(images)
        .with_settings(relay.settings);

    let image_client = state.client.image();
    let target = Target::resolve_upstream(image_client.config());

    match image_client.generate_via(&target, &request).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            log::error!("[req:{}] {} ({})", request_id, e, e.kind().code());
            error_response(&e)
        }
    }
}

pub fn error_response(err: &GenerationError) -> HttpResponse {
    let status = StatusCode::from_u16(err.kind().http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response_with_status(status, err)
}

fn error_response_with_status(status: StatusCode, err: &GenerationError) -> HttpResponse {
    HttpResponse::build(status).json(RelayErrorBody::from(err))
}
