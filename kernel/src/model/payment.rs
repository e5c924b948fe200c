use crate::model::id::PaymentIntentId;
use derive_new::new;

// 決済プロセッサ側の payment intent のスナップショット
#[derive(Debug, Clone, new)]
pub struct PaymentIntent {
    pub id: PaymentIntentId,
    pub client_secret: String,
    pub status: PaymentIntentStatus,
    // マイナー通貨単位（セントなど）での請求額
    pub amount: i64,
}

impl PaymentIntent {
    // まだ決済が完了・取消されていない intent は金額を更新して使い回せる
    pub fn is_open(&self) -> bool {
        !matches!(
            self.status,
            PaymentIntentStatus::Succeeded | PaymentIntentStatus::Canceled
        )
    }
}

// プロセッサが返すステータス文字列をそのまま写した列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
}

// チェックアウト開始の戻り値。client_secret は呼び出し側が
// プロセッサのホスト型 UI に渡す。
#[derive(Debug, Clone, new)]
pub struct CheckoutSession {
    pub payment_intent_id: PaymentIntentId,
    pub client_secret: String,
}
