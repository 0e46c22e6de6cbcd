use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::app_error::{AppError, AppResult};
use crate::application::ports::gateway::{GatewayTransaction, PaymentGateway};
use crate::domain::entities::money::Money;

/// JSON client for the payment gateway's `createTransactionRequest` API.
///
/// Every call carries a bounded timeout. A timeout or transport failure is
/// `GatewayError`, never assumed to be a decline or a success. A well-formed
/// response that is not approved is `GatewayDeclined` with the gateway's own
/// code and message.
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
    api_login_id: String,
    transaction_key: SecretString,
}

impl HttpGateway {
    pub fn new(
        endpoint: &str,
        api_login_id: &str,
        transaction_key: SecretString,
        timeout_secs: u64,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| AppError::Internal(format!("http client: {}", err)))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_login_id: api_login_id.to_string(),
            transaction_key,
        })
    }

    async fn send_transaction(
        &self,
        txn_type: &str,
        transaction_request: Value,
    ) -> AppResult<GatewayTransaction> {
        let mut request = transaction_request;
        request["transactionType"] = json!(txn_type);
        let body = json!({
            "createTransactionRequest": {
                "merchantAuthentication": {
                    "name": self.api_login_id,
                    "transactionKey": self.transaction_key.expose_secret(),
                },
                "transactionRequest": request,
            }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(txn_type = %txn_type, error = %err, "gateway transport failure");
                AppError::GatewayError(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::GatewayError(format!(
                "gateway returned HTTP {}",
                status
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| AppError::GatewayError(format!("malformed gateway response: {}", err)))?;
        map_response(txn_type, &payload)
    }
}

fn map_response(txn_type: &str, payload: &Value) -> AppResult<GatewayTransaction> {
    let response = payload
        .get("createTransactionResponse")
        .unwrap_or(payload);
    let result_code = response
        .pointer("/messages/resultCode")
        .and_then(Value::as_str)
        .unwrap_or("");
    let txn_response = response.get("transactionResponse");

    let trans_id = txn_response
        .and_then(|t| t.get("transId"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty() && *id != "0");
    let response_code = txn_response
        .and_then(|t| t.get("responseCode"))
        .map(value_to_string)
        .unwrap_or_else(|| "0".to_string());
    let response_message = txn_response
        .and_then(|t| t.pointer("/messages/0/description"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if result_code.eq_ignore_ascii_case("Ok")
        && let Some(trans_id) = trans_id
    {
        return Ok(GatewayTransaction {
            transaction_id: trans_id.to_string(),
            response_code,
            response_message: response_message.unwrap_or_else(|| "approved".to_string()),
            processed_at: Utc::now(),
        });
    }

    // Prefer the transaction-level error, falling back to the envelope.
    let (code, message) = txn_response
        .and_then(|t| t.pointer("/errors/0"))
        .map(|err| {
            (
                err.get("errorCode").map(value_to_string),
                err.get("errorText").map(value_to_string),
            )
        })
        .unwrap_or_else(|| {
            (
                response
                    .pointer("/messages/message/0/code")
                    .map(value_to_string),
                response
                    .pointer("/messages/message/0/text")
                    .map(value_to_string),
            )
        });

    let code = code.unwrap_or_else(|| response_code.clone());
    let message = message
        .or(response_message)
        .unwrap_or_else(|| format!("gateway rejected {}", txn_type));
    tracing::warn!(
        txn_type = %txn_type,
        response_code = %code,
        "gateway declined transaction"
    );
    Err(AppError::GatewayDeclined(format!("{}: {}", code, message)))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn authorize(
        &self,
        amount: &Money,
        payment_nonce: &str,
        order_ref: &str,
    ) -> AppResult<GatewayTransaction> {
        self.send_transaction(
            "authOnlyTransaction",
            json!({
                "amount": amount.amount().to_string(),
                "payment": {
                    "opaqueData": {
                        "dataDescriptor": "COMMON.ACCEPT.INAPP.PAYMENT",
                        "dataValue": payment_nonce,
                    }
                },
                "order": { "invoiceNumber": order_ref },
            }),
        )
        .await
    }

    async fn capture(
        &self,
        amount: &Money,
        gateway_txn_id: &str,
    ) -> AppResult<GatewayTransaction> {
        self.send_transaction(
            "priorAuthCaptureTransaction",
            json!({
                "amount": amount.amount().to_string(),
                "refTransId": gateway_txn_id,
            }),
        )
        .await
    }

    async fn purchase(
        &self,
        amount: &Money,
        payment_nonce: &str,
        order_ref: &str,
    ) -> AppResult<GatewayTransaction> {
        self.send_transaction(
            "authCaptureTransaction",
            json!({
                "amount": amount.amount().to_string(),
                "payment": {
                    "opaqueData": {
                        "dataDescriptor": "COMMON.ACCEPT.INAPP.PAYMENT",
                        "dataValue": payment_nonce,
                    }
                },
                "order": { "invoiceNumber": order_ref },
            }),
        )
        .await
    }

    async fn refund(
        &self,
        amount: &Money,
        gateway_txn_id: &str,
        last_four: &str,
    ) -> AppResult<GatewayTransaction> {
        self.send_transaction(
            "refundTransaction",
            json!({
                "amount": amount.amount().to_string(),
                "refTransId": gateway_txn_id,
                "payment": {
                    "creditCard": {
                        "cardNumber": last_four,
                        "expirationDate": "XXXX",
                    }
                },
            }),
        )
        .await
    }

    async fn void_transaction(&self, gateway_txn_id: &str) -> AppResult<GatewayTransaction> {
        self.send_transaction(
            "voidTransaction",
            json!({
                "refTransId": gateway_txn_id,
            }),
        )
        .await
    }
}
