// Route exports
pub mod auth;
pub mod ranking;

use actix_web::{error, web, HttpRequest, HttpResponse};
use std::collections::BTreeMap;

use crate::models::ErrorResponse;

pub use auth::{JwtVerifier, Requester};
pub use ranking::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(ranking::configure);
}

/// JSON extractor config that answers malformed bodies with a 400 error body
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(handle_json_payload_error)
}

/// Handle JSON payload errors
fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);

    let mut body = ErrorResponse::new("invalid_json", format!("Invalid JSON: {}", err), 400);
    if let error::JsonPayloadError::Deserialize(e) = &err {
        if e.is_data() {
            let field = missing_field(&e.to_string()).unwrap_or("body").to_string();
            body = body.with_details(BTreeMap::from([(field, vec![e.to_string()])]));
        }
    }

    let response = HttpResponse::BadRequest().json(body);
    error::InternalError::from_response(err, response).into()
}

/// Field name out of serde's "missing field `name`" message
fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next().filter(|field| !field.is_empty())
}
