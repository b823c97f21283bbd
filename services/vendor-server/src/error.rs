//! HTTP mapping for vendor errors

use axum::{http::StatusCode, response::IntoResponse, Json};
use vendor_core::VendorError;

/// Handler error, rendered as `{ "error": true, "code", "message" }`
#[derive(Debug)]
pub struct ApiError(pub VendorError);

impl From<VendorError> for ApiError {
    fn from(err: VendorError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            VendorError::InvalidAmount { .. }
            | VendorError::ZeroQuote { .. }
            | VendorError::AmountOverflow { .. }
            | VendorError::InvalidRate { .. }
            | VendorError::ReservedAddress { .. }
            | VendorError::InvalidConfig { .. } => StatusCode::BAD_REQUEST,
            VendorError::InsufficientBalance { .. }
            | VendorError::InsufficientNativeReserve { .. }
            | VendorError::InsufficientTokenReserve { .. } => StatusCode::CONFLICT,
            VendorError::AllowanceExceeded { .. } | VendorError::Unauthorized { .. } => {
                StatusCode::FORBIDDEN
            }
            VendorError::UnbalancedBatch { .. } | VendorError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = Json(serde_json::json!({
            "error": true,
            "code": self.0.error_code(),
            "message": self.0.to_string(),
            "retriable": self.0.is_retriable(),
        }));

        (status, body).into_response()
    }
}
