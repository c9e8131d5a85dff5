//! Signer that delegates to an external signing service over HTTP

use super::{Signer, SigningError};
use crate::config::{NetworkKind, SignerConfig};
use crate::tx::TransactionSpec;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    address: &'a str,
    network: &'static str,
    nonce: u64,
    transaction: &'a TransactionSpec,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    /// Hex-encoded serialized signed transaction
    signed_tx: String,
}

/// Posts each call to a signing service and returns its signed bytes
pub struct RemoteSigner {
    client: Client,
    url: String,
    address: String,
    network: NetworkKind,
}

impl RemoteSigner {
    pub fn new(config: &SignerConfig, network: NetworkKind) -> Self {
        Self {
            client: Client::new(),
            url: config.url.clone(),
            address: config.address.clone(),
            network,
        }
    }

    fn network_name(&self) -> &'static str {
        match self.network {
            NetworkKind::Mainnet => "mainnet",
            NetworkKind::Testnet => "testnet",
        }
    }
}

#[async_trait]
impl Signer for RemoteSigner {
    async fn sign(&self, spec: &TransactionSpec, nonce: u64) -> Result<Vec<u8>, SigningError> {
        let request = SignRequest {
            address: &self.address,
            network: self.network_name(),
            nonce,
            transaction: spec,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SigningError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SigningError::Refused(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(SigningError::Unavailable(status.to_string()));
        }

        let signed: SignResponse = resp
            .json()
            .await
            .map_err(|e| SigningError::InvalidPayload(e.to_string()))?;

        debug!("Signed {} with nonce {}", spec.function_name, nonce);
        decode_signed(&signed.signed_tx)
    }
}

fn decode_signed(signed_tx: &str) -> Result<Vec<u8>, SigningError> {
    let bytes = hex::decode(signed_tx.trim_start_matches("0x"))
        .map_err(|e| SigningError::InvalidPayload(e.to_string()))?;
    if bytes.is_empty() {
        return Err(SigningError::InvalidPayload("empty transaction".to_string()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::ArgValue;

    #[test]
    fn test_decode_signed() {
        assert_eq!(decode_signed("0x0a0b").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(decode_signed("ff").unwrap(), vec![0xff]);
        assert!(matches!(
            decode_signed("0x"),
            Err(SigningError::InvalidPayload(_))
        ));
        assert!(matches!(
            decode_signed("zz"),
            Err(SigningError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let spec = TransactionSpec::new("SP2", "bit-token", "mint", vec![ArgValue::Uint(1)], 4000);
        let request = SignRequest {
            address: "ST1SENDER",
            network: "testnet",
            nonce: 9,
            transaction: &spec,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["nonce"], 9);
        assert_eq!(json["transaction"]["function_name"], "mint");
        assert_eq!(json["transaction"]["fee"], 4000);
    }
}
