use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::ApiResponse;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error object carried inside the response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "code": "validation_failed",
    "message": "Some items in your cart are no longer available",
    "details": ["Linen Shirt: only 1 left in stock (requested 2)"]
}))]
pub struct ErrorBody {
    /// Machine-readable error code
    #[schema(example = "insufficient_stock")]
    pub code: String,
    /// Human-readable description, safe to show to a customer
    pub message: String,
    /// Per-item reasons for business-rule failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Cart item {0} not found")]
    CartItemNotFound(Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("A size must be selected for {0}")]
    SizeRequired(String),

    #[error("Size '{size}' is not available for {product}")]
    InvalidSize { product: String, size: String },

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Some items in your cart are no longer available")]
    ValidationFailed(Vec<String>),

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProductNotFound(_)
            | Self::OrderNotFound(_)
            | Self::CartItemNotFound(_)
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::SizeRequired(_)
            | Self::InvalidSize { .. }
            | Self::InsufficientStock(_)
            | Self::ValidationFailed(_)
            | Self::EmptyCart => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code exposed as `error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProductNotFound(_) => "product_not_found",
            Self::OrderNotFound(_) => "order_not_found",
            Self::CartItemNotFound(_) => "cart_item_not_found",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::SizeRequired(_) => "size_required",
            Self::InvalidSize { .. } => "invalid_size",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::ValidationFailed(_) => "validation_failed",
            Self::EmptyCart => "empty_cart",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::ProductNotFound(_) => "Product not found".to_string(),
            Self::OrderNotFound(_) => "Order not found".to_string(),
            Self::CartItemNotFound(_) => "Cart item not found".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn details(&self) -> Option<Vec<String>> {
        match self {
            Self::ValidationFailed(reasons) => Some(reasons.clone()),
            _ => None,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.response_message(),
            details: self.details(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(
                request_id = current_request_id().as_deref().unwrap_or("-"),
                error = %self,
                "request failed with internal error"
            );
        }

        let envelope: ApiResponse<()> = ApiResponse::failure(self.to_body());
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn envelope_of(err: ServiceError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::ProductNotFound(Uuid::new_v4()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::SizeRequired("Linen Shirt".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InsufficientStock("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServiceError::EmptyCart.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("relation \"orders\" missing".into()))
                .response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::Other(anyhow::anyhow!("pool exhausted")).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::ValidationError("quantity out of range".into()).response_message(),
            "Validation error: quantity out of range"
        );
    }

    #[tokio::test]
    async fn validation_failed_carries_details_array() {
        let (status, json) = envelope_of(ServiceError::ValidationFailed(vec![
            "Linen Shirt is no longer available".into(),
            "Wool Coat: only 1 left in stock (requested 3)".into(),
        ]))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "validation_failed");
        assert_eq!(json["error"]["details"].as_array().unwrap().len(), 2);
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn internal_error_envelope_has_no_details() {
        let (status, json) = envelope_of(ServiceError::InternalError("disk full".into())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["code"], "internal_error");
        assert_eq!(json["error"]["message"], "Internal server error");
        assert!(json["error"].get("details").is_none());
    }
}
