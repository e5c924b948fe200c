use chrono::{DateTime, NaiveDate, Utc};
use garde::Validate;
use kernel::model::{
    date_range::DateRange,
    id::{PaymentIntentId, ReservationId, RoomId, UserId},
    payment::CheckoutSession,
    reservation::{event::InitiateBooking, PaymentStatus, Reservation},
};
use serde::{Deserialize, Serialize};
use shared::error::AppResult;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[garde(length(min = 1))]
    pub room_id: String,
    #[garde(length(min = 1))]
    pub guest_user_id: String,
    #[garde(length(min = 1))]
    pub hotel_owner_user_id: String,
    #[garde(skip)]
    pub start_date: DateTime<Utc>,
    #[garde(skip)]
    pub end_date: DateTime<Utc>,
    #[garde(range(min = 1))]
    pub nightly_price: i64,
    // チェックアウト再開時のみ渡される
    #[garde(skip)]
    pub payment_intent_id: Option<String>,
}

impl CreateCheckoutRequest {
    // 時刻付きの入力を日単位の範囲に正規化してイベントへ変換する
    pub fn into_event(self) -> AppResult<InitiateBooking> {
        let date_range = DateRange::from_timestamps(self.start_date, self.end_date)?;
        Ok(InitiateBooking::new(
            RoomId::from(self.room_id),
            UserId::from(self.guest_user_id),
            UserId::from(self.hotel_owner_user_id),
            date_range,
            self.nightly_price,
            self.payment_intent_id.map(PaymentIntentId::from),
        ))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub payment_intent_id: PaymentIntentId,
    pub client_secret: String,
}

impl From<CheckoutSession> for CheckoutSessionResponse {
    fn from(value: CheckoutSession) -> Self {
        let CheckoutSession {
            payment_intent_id,
            client_secret,
        } = value;
        Self {
            payment_intent_id,
            client_secret,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsResponse {
    pub items: Vec<BookingResponse>,
}

impl From<Vec<Reservation>> for BookingsResponse {
    fn from(value: Vec<Reservation>) -> Self {
        Self {
            items: value.into_iter().map(BookingResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub reservation_id: ReservationId,
    pub room_id: RoomId,
    pub guest_user_id: UserId,
    pub hotel_owner_user_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: i64,
    pub payment_intent_id: PaymentIntentId,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Reservation> for BookingResponse {
    fn from(value: Reservation) -> Self {
        let Reservation {
            reservation_id,
            room_id,
            guest_user_id,
            hotel_owner_user_id,
            date_range,
            total_price,
            payment_intent_id,
            payment_status,
            created_at,
        } = value;
        Self {
            reservation_id,
            room_id,
            guest_user_id,
            hotel_owner_user_id,
            start_date: date_range.check_in(),
            end_date: date_range.check_out(),
            total_price,
            payment_intent_id,
            payment_status,
            created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    // 省略時は「昨日」以降（アクティブな予約のみ）を対象にする
    pub after: Option<NaiveDate>,
}
