use crate::model::date_range::DateRange;
use crate::model::id::{PaymentIntentId, ReservationId, RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod event;

#[derive(Debug, Clone)]
pub struct Reservation {
    pub reservation_id: ReservationId,
    pub room_id: RoomId,
    pub guest_user_id: UserId,
    pub hotel_owner_user_id: UserId,
    pub date_range: DateRange,
    // 予約作成時点の「宿泊数 × 1泊あたりの料金」。以降は再計算しない。
    pub total_price: i64,
    pub payment_intent_id: PaymentIntentId,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

// Pending --mark_paid--> Paid
// Paid は終端状態で、以降の遷移は存在しない。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}
