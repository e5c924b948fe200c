use async_trait::async_trait;
use kernel::gateway::payment::PaymentGateway;
use kernel::model::{
    id::PaymentIntentId,
    payment::{PaymentIntent, PaymentIntentStatus},
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shared::{
    config::PaymentConfig,
    error::{AppError, AppResult},
};
use std::str::FromStr;
use std::time::Duration;

// 決済プロセッサ（Stripe 互換 API）へのクライアント。
// タイムアウトを超えた呼び出しは PaymentProviderError になり、
// 台帳側の状態は一切変更されない。
pub struct PaymentGatewayImpl {
    client: Client,
    cfg: PaymentConfig,
}

impl PaymentGatewayImpl {
    pub fn new(cfg: PaymentConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| AppError::PaymentProviderError(e.into()))?;
        Ok(Self { client, cfg })
    }

    fn intents_url(&self) -> String {
        format!("{}/v1/payment_intents", self.cfg.api_base)
    }

    fn intent_url(&self, intent_id: &PaymentIntentId) -> String {
        format!("{}/v1/payment_intents/{intent_id}", self.cfg.api_base)
    }

    async fn read_intent(&self, res: reqwest::Response) -> AppResult<PaymentIntent> {
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "payment provider returned an error response");
            return Err(AppError::PaymentProviderError(anyhow::anyhow!(
                "payment provider returned {status}: {body}"
            )));
        }
        let dto: PaymentIntentDto = res
            .json()
            .await
            .map_err(|e| AppError::PaymentProviderError(e.into()))?;
        dto.try_into()
    }
}

#[async_trait]
impl PaymentGateway for PaymentGatewayImpl {
    async fn create_intent(&self, amount: i64, currency: &str) -> AppResult<PaymentIntent> {
        let params = [
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        let res = self
            .client
            .post(self.intents_url())
            .bearer_auth(&self.cfg.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::PaymentProviderError(e.into()))?;
        self.read_intent(res).await
    }

    async fn update_intent(
        &self,
        intent_id: &PaymentIntentId,
        amount: i64,
    ) -> AppResult<PaymentIntent> {
        let params = [("amount", amount.to_string())];
        let res = self
            .client
            .post(self.intent_url(intent_id))
            .bearer_auth(&self.cfg.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::PaymentProviderError(e.into()))?;
        self.read_intent(res).await
    }

    async fn retrieve_intent(
        &self,
        intent_id: &PaymentIntentId,
    ) -> AppResult<Option<PaymentIntent>> {
        let res = self
            .client
            .get(self.intent_url(intent_id))
            .bearer_auth(&self.cfg.secret_key)
            .send()
            .await
            .map_err(|e| AppError::PaymentProviderError(e.into()))?;

        // プロセッサ側に存在しない intent は None として呼び出し側に返す
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.read_intent(res).await.map(Some)
    }
}

#[derive(Deserialize)]
struct PaymentIntentDto {
    id: String,
    client_secret: String,
    status: String,
    amount: i64,
}

impl TryFrom<PaymentIntentDto> for PaymentIntent {
    type Error = AppError;

    fn try_from(value: PaymentIntentDto) -> AppResult<PaymentIntent> {
        let status = PaymentIntentStatus::from_str(&value.status).map_err(|_| {
            AppError::ConversionEntityError(format!(
                "未知の payment intent ステータスです: {}",
                value.status
            ))
        })?;
        Ok(PaymentIntent::new(
            PaymentIntentId::from(value.id),
            value.client_secret,
            status,
            value.amount,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_dto_converts_processor_statuses() {
        let dto = PaymentIntentDto {
            id: "pi_1".into(),
            client_secret: "pi_1_secret".into(),
            status: "requires_payment_method".into(),
            amount: 20_000_000,
        };
        let intent = PaymentIntent::try_from(dto).unwrap();
        assert!(intent.is_open());

        let dto = PaymentIntentDto {
            id: "pi_1".into(),
            client_secret: "pi_1_secret".into(),
            status: "succeeded".into(),
            amount: 20_000_000,
        };
        let intent = PaymentIntent::try_from(dto).unwrap();
        assert!(!intent.is_open());
    }

    #[test]
    fn unknown_status_is_a_conversion_error() {
        let dto = PaymentIntentDto {
            id: "pi_1".into(),
            client_secret: "pi_1_secret".into(),
            status: "mystery".into(),
            amount: 0,
        };
        assert!(matches!(
            PaymentIntent::try_from(dto),
            Err(AppError::ConversionEntityError(_))
        ));
    }
}
