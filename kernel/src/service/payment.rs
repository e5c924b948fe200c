use crate::gateway::payment::PaymentGateway;
use crate::model::{id::PaymentIntentId, payment::PaymentIntent};
use derive_new::new;
use shared::error::AppResult;
use std::sync::Arc;

// 予約 1 件と決済プロセッサ側の intent を 1:1 に保つための調整役。
// チェックアウトのやり直しのたびに放置 intent が増えるのを防ぐ。
#[derive(new)]
pub struct PaymentIntentCoordinator {
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentIntentCoordinator {
    // 既存の intent がまだ未確定ならプロセッサ側で金額だけ更新して
    // 同じ intent を返す（支払い前の日程変更をサポートする）。
    // intent が見つからない・すでに確定済みの場合は新規作成する。
    pub async fn get_or_create_intent(
        &self,
        existing: Option<&PaymentIntentId>,
        amount: i64,
        currency: &str,
    ) -> AppResult<PaymentIntent> {
        if let Some(intent_id) = existing {
            if let Some(intent) = self.gateway.retrieve_intent(intent_id).await? {
                if intent.is_open() {
                    return self.gateway.update_intent(intent_id, amount).await;
                }
            }
        }
        self.gateway.create_intent(amount, currency).await
    }
}
