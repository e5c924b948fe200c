use crate::model::{id::PaymentIntentId, payment::PaymentIntent};
use async_trait::async_trait;
use shared::error::AppResult;

// 外部決済プロセッサへの出口。いずれの操作もプロセッサへの
// ネットワーク呼び出し 1 回に対応し、失敗は PaymentProviderError になる。
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, amount: i64, currency: &str) -> AppResult<PaymentIntent>;

    async fn update_intent(
        &self,
        intent_id: &PaymentIntentId,
        amount: i64,
    ) -> AppResult<PaymentIntent>;

    // プロセッサ側に intent が存在しない場合は None
    async fn retrieve_intent(
        &self,
        intent_id: &PaymentIntentId,
    ) -> AppResult<Option<PaymentIntent>>;
}
