use axum::{http::StatusCode, response::IntoResponse};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    EntityNotFound(String),
    #[error("{0}")]
    InvalidDateRange(String),
    // 同じ payment intent に紐づく予約がすでに存在する
    #[error("{0}")]
    DuplicateIntent(String),
    // 確定時の再チェックで、支払い済みの予約と日程が重なっていた
    #[error("{0}")]
    SlotNoLongerAvailable(String),
    #[error("リクエストの内容が不正です。")]
    ValidationError(#[from] garde::Report),
    #[error("決済プロバイダへのリクエストに失敗しました。")]
    PaymentProviderError(#[source] anyhow::Error),
    #[error("トランザクションを実行できませんでした。")]
    TransactionError(#[source] sqlx::Error),
    #[error("データベース処理実行中にエラーが発生しました。")]
    SpecificOperationError(#[source] sqlx::Error),
    #[error("No rows affected: {0}")]
    NoRowsAffectedError(String),
    #[error("{0}")]
    ConversionEntityError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match self {
            AppError::ValidationError(_) | AppError::InvalidDateRange(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateIntent(_) | AppError::SlotNoLongerAvailable(_) => {
                StatusCode::CONFLICT
            }
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PaymentProviderError(_) => StatusCode::BAD_GATEWAY,
            AppError::TransactionError(_)
            | AppError::SpecificOperationError(_)
            | AppError::NoRowsAffectedError(_)
            | AppError::ConversionEntityError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status_code.is_server_error() {
            tracing::error!(
                error.cause_chain = ?self,
                error.message = %self,
                "Unexpected error happened"
            );
        } else {
            tracing::warn!(
                error.cause_chain = ?self,
                error.message = %self,
                "Client error happened"
            );
        }

        (
            status_code,
            axum::Json(serde_json::json!({ "message": self.to_string() })),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
