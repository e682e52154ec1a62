//! The injected wallet provider capability and its JSON-RPC implementation.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::client::Error as ClientError;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde_json::Value;

/// EIP-1193: the user rejected the request (closed the approval popup).
pub const CODE_USER_REJECTED: i64 = 4001;

/// EIP-3085/wallet convention: the requested chain is unknown to the wallet.
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;

/// Capability interface of an injected wallet or RPC endpoint.
///
/// Mirrors the browser provider surface: an `isMetaMask`-style availability
/// flag plus a JSON-RPC-like `request` call. Implementations never retry;
/// recovering from a failure is a user-initiated action.
pub trait WalletProvider {
    fn is_available(&self) -> bool;

    fn request(
        &self,
        method: &str,
        params: Value,
    ) -> impl Future<Output = Result<Value, ProviderError>> + Send;
}

/// Normalized shape of the duck-typed errors providers raise: an optional
/// numeric code plus a message. Classification into the user-facing taxonomy
/// happens in [`crate::wallet::submitter::classify_provider_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// An error raised on our side of the provider boundary (no code).
    pub fn local(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn user_rejected(&self) -> bool {
        self.code == Some(CODE_USER_REJECTED)
    }

    pub fn unrecognized_chain(&self) -> bool {
        self.code == Some(CODE_UNRECOGNIZED_CHAIN)
    }

    pub fn insufficient_funds(&self) -> bool {
        self.message.to_ascii_lowercase().contains("insufficient funds")
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "provider error {code}: {}", self.message),
            None => write!(f, "provider error: {}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Provider backed by a plain JSON-RPC endpoint.
///
/// Forwards requests verbatim. Useful for operator tooling against a dev
/// node that signs with its own unlocked accounts; a production page talks
/// to the browser-injected provider instead.
#[derive(Clone)]
pub struct RpcProvider {
    inner: HttpClient,
    timeout: Duration,
}

impl RpcProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self {
            inner: client,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        assert!(
            self.timeout >= Duration::from_millis(100),
            "Timeout invariant broken"
        );
        self.timeout
    }
}

impl WalletProvider for RpcProvider {
    fn is_available(&self) -> bool {
        true
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut array = ArrayParams::new();
        match params {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    array
                        .insert(item)
                        .map_err(|err| ProviderError::local(err.to_string()))?;
                }
            }
            single => {
                array
                    .insert(single)
                    .map_err(|err| ProviderError::local(err.to_string()))?;
            }
        }

        self.inner
            .request::<Value, _>(method, array)
            .await
            .map_err(map_client_error)
    }
}

fn map_client_error(err: ClientError) -> ProviderError {
    match err {
        ClientError::Call(object) => ProviderError {
            code: Some(i64::from(object.code())),
            message: object.message().to_string(),
        },
        other => ProviderError::local(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_predicates() {
        assert!(ProviderError::new(CODE_USER_REJECTED, "User rejected the request").user_rejected());
        assert!(ProviderError::new(CODE_UNRECOGNIZED_CHAIN, "Unrecognized chain").unrecognized_chain());
        assert!(
            ProviderError::new(-32000, "insufficient funds for gas * price + value")
                .insufficient_funds()
        );
        assert!(!ProviderError::local("connection reset").user_rejected());
    }

    #[test]
    fn error_display_with_and_without_code() {
        let coded = ProviderError::new(4001, "User rejected the request");
        assert_eq!(
            coded.to_string(),
            "provider error 4001: User rejected the request"
        );
        let local = ProviderError::local("no accounts");
        assert_eq!(local.to_string(), "provider error: no accounts");
    }
}
