//! JSON-RPC frames exchanged on the pubsub websocket.
//!
//! Inbound text is decoded into [`InboundFrame`] before anything else looks at it:
//! a frame carrying a `method` is a push notification, anything else is a response
//! to one of our requests and is correlated by its echoed `id`.

use serde::Deserialize;
use serde_json::{json, Value};
use solana_rpc_client_api::config::RpcSignatureSubscribeConfig;
use solana_sdk::clock::Slot;

use crate::errors::{PubsubError, PubsubResult};

pub const SIGNATURE_SUBSCRIBE: &str = "signatureSubscribe";
pub const SIGNATURE_UNSUBSCRIBE: &str = "signatureUnsubscribe";
pub const SIGNATURE_NOTIFICATION: &str = "signatureNotification";

pub fn signature_subscribe_request(
    id: u64,
    signature: &str,
    config: &RpcSignatureSubscribeConfig,
) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": SIGNATURE_SUBSCRIBE,
        "params": [signature, config],
    })
    .to_string()
}

pub fn signature_unsubscribe_request(id: u64, subscription: u64) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": SIGNATURE_UNSUBSCRIBE,
        "params": [subscription],
    })
    .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    /// ack of `signatureSubscribe`
    SubscriptionId(u64),
    /// ack of `signatureUnsubscribe`
    Unsubscribed(bool),
    Error(RpcErrorObject),
}

/// `value` of a signature notification
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SignatureNotificationValue {
    Processed { err: Option<Value> },
    /// `"receivedSignature"`, only sent with `enableReceivedNotification`
    Received(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationContext {
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignatureNotificationResult {
    pub context: NotificationContext,
    pub value: SignatureNotificationValue,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignatureNotification {
    pub subscription: u64,
    pub result: SignatureNotificationResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Response { id: u64, payload: ResponsePayload },
    SignatureNotification(SignatureNotification),
    OtherNotification { method: String },
}

#[derive(Deserialize)]
struct RawFrame {
    id: Option<u64>,
    method: Option<String>,
    result: Option<Value>,
    error: Option<RpcErrorObject>,
    params: Option<Value>,
}

impl InboundFrame {
    pub fn decode(text: &str) -> PubsubResult<Self> {
        let raw: RawFrame = serde_json::from_str(text)?;

        if let Some(method) = raw.method {
            if method != SIGNATURE_NOTIFICATION {
                return Ok(Self::OtherNotification { method });
            }

            let Some(params) = raw.params else {
                return Err(PubsubError::UnexpectedFrame(format!(
                    "{method} without params"
                )));
            };

            return Ok(Self::SignatureNotification(serde_json::from_value(params)?));
        }

        let Some(id) = raw.id else {
            return Err(PubsubError::UnexpectedFrame(format!(
                "response without id: {text}"
            )));
        };

        let payload = match (raw.result, raw.error) {
            (_, Some(error)) => ResponsePayload::Error(error),
            (Some(Value::Bool(unsubscribed)), None) => ResponsePayload::Unsubscribed(unsubscribed),
            (Some(result), None) => match result.as_u64() {
                Some(subscription) => ResponsePayload::SubscriptionId(subscription),
                None => {
                    return Err(PubsubError::UnexpectedFrame(format!(
                        "unexpected result for request {id}: {result}"
                    )))
                }
            },
            (None, None) => {
                return Err(PubsubError::UnexpectedFrame(format!(
                    "response {id} without result"
                )))
            }
        };

        Ok(Self::Response { id, payload })
    }
}
