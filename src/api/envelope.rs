use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{ClientError, Result};

/// `{ status, message?, data? }`, the one response shape every route shares.
///
/// Some routes name their payload after what it holds (`slots`, `user`,
/// `professionals`, `sessions`); all of those are read as `data`.
/// Router-level rejections use `error` instead of `message`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
    #[serde(alias = "slots", alias = "user", alias = "professionals", alias = "sessions")]
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Loose {
    #[serde(default, alias = "error")]
    message: Option<String>,
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Classifies a raw response. Anything other than an OK HTTP status with
    /// `status == "success"` is a backend failure, whatever else the body holds.
    pub fn decode(http_status: u16, body: &[u8]) -> Result<Option<T>> {
        if !(200..300).contains(&http_status) {
            let message = serde_json::from_slice::<Loose>(body)
                .ok()
                .and_then(|l| l.message)
                .unwrap_or_else(|| format!("HTTP {http_status}"));
            return Err(ClientError::Backend { status: http_status, message });
        }

        let envelope: Envelope<T> = serde_json::from_slice(body)
            .map_err(|e| ClientError::Transport(format!("malformed response: {e}")))?;

        if envelope.status.as_deref() != Some("success") {
            return Err(ClientError::Backend {
                status: http_status,
                message: envelope.message.unwrap_or_else(|| "Request failed".to_string()),
            });
        }
        Ok(envelope.data)
    }
}

pub async fn read_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Option<T>> {
    let status = resp.status().as_u16();
    let body = resp.bytes().await?;
    Envelope::<T>::decode(status, &body)
}
