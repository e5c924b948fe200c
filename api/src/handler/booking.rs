use crate::model::booking::{
    BookingResponse, BookingsResponse, CheckoutSessionResponse, CreateCheckoutRequest,
    ListBookingsQuery,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use garde::Validate;
use kernel::model::id::{PaymentIntentId, RoomId};
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

// チェックアウト開始。Pending の予約レコードで日程を仮押さえし、
// プロセッサのホスト型 UI に渡す client_secret を返す。
pub async fn initiate_booking(
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let session = registry
        .booking_orchestrator()
        .initiate_booking(req.into_event()?)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutSessionResponse::from(session)),
    ))
}

// プロセッサが支払い完了を報告したあとの確定処理。
// パスパラメータはプロセッサ発行の payment intent ID。
pub async fn confirm_booking(
    Path(payment_intent_id): Path<String>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<BookingResponse>> {
    registry
        .booking_orchestrator()
        .confirm_booking(&PaymentIntentId::from(payment_intent_id))
        .await
        .map(BookingResponse::from)
        .map(Json)
}

// ルームの確定済み予約一覧。カレンダーの予約済み日の無効化に使う。
pub async fn show_paid_bookings(
    Path(room_id): Path<String>,
    Query(query): Query<ListBookingsQuery>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<BookingsResponse>> {
    let after = query
        .after
        .unwrap_or_else(|| (Utc::now() - Duration::days(1)).date_naive());

    registry
        .booking_orchestrator()
        .paid_reservations(&RoomId::from(room_id), after)
        .await
        .map(BookingsResponse::from)
        .map(Json)
}
