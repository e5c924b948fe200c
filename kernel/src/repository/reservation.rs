use crate::model::{
    id::{PaymentIntentId, RoomId},
    reservation::{
        event::{CreateReservation, UpdatePendingReservation},
        Reservation,
    },
};
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::error::AppResult;

// 予約台帳。予約レコードの唯一の所有者であり、レコードを変更できるのは
// このトレイトの操作だけである。
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    // Pending 状態の予約を新規作成する。
    // 同じ payment_intent_id の予約がすでにあれば DuplicateIntent を返す。
    async fn create(&self, event: CreateReservation) -> AppResult<Reservation>;

    // intent を使い回すチェックアウト再開時に、Pending なドラフトの
    // 日程・料金を差し替える。Paid のレコードは変更できない。
    async fn update_pending(&self, event: UpdatePendingReservation) -> AppResult<Reservation>;

    // payment_intent_id に紐づく予約を取得する
    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &PaymentIntentId,
    ) -> AppResult<Option<Reservation>>;

    // チェックアウト日が after 以降の予約一覧を取得する
    // （過去の予約は空き判定・表示の対象外とするため）
    async fn list_by_room(&self, room_id: &RoomId, after: NaiveDate) -> AppResult<Vec<Reservation>>;

    // Pending → Paid への遷移。実装は以下を 1 つの原子的な操作として
    // 同一ルーム内で直列化しなければならない：
    //   - 同じルームの他の Paid 予約と日程が重ならないことの確認
    //   - ステータスの更新
    // すでに Paid のレコードに対しては何もせずそのまま返す（冪等）。
    async fn mark_paid(&self, payment_intent_id: &PaymentIntentId) -> AppResult<Reservation>;
}
