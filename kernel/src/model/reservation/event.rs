use crate::model::date_range::DateRange;
use crate::model::id::{PaymentIntentId, RoomId, UserId};
use derive_new::new;

// チェックアウト開始時に呼び出し側から渡されるドラフト。
// ユーザー識別子は外部の認証プロバイダが発行したものをそのまま受け取る。
#[derive(Debug, new)]
pub struct InitiateBooking {
    pub room_id: RoomId,
    pub guest_user_id: UserId,
    pub hotel_owner_user_id: UserId,
    pub date_range: DateRange,
    pub nightly_price: i64,
    // 前回のチェックアウトを再開する場合に渡される intent ID
    pub payment_intent_id: Option<PaymentIntentId>,
}

#[derive(Debug, new)]
pub struct CreateReservation {
    pub room_id: RoomId,
    pub guest_user_id: UserId,
    pub hotel_owner_user_id: UserId,
    pub date_range: DateRange,
    pub total_price: i64,
    pub payment_intent_id: PaymentIntentId,
}

// intent を使い回すチェックアウト再開時に、Pending なドラフトの
// 日程と料金を差し替えるためのイベント
#[derive(Debug, new)]
pub struct UpdatePendingReservation {
    pub payment_intent_id: PaymentIntentId,
    pub date_range: DateRange,
    pub total_price: i64,
}
