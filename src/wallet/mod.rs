//! Wallet-facing tip flow: provider capability, session state machine and
//! the single-attempt tip submitter with its closed failure taxonomy.
//!
//! The provider handle is always injected explicitly so tests can substitute
//! a scripted provider for the browser wallet or RPC endpoint.

pub mod connector;
pub mod provider;
pub mod submitter;

pub use connector::{NetworkStatus, SessionState, WalletConnector};
pub use provider::{ProviderError, RpcProvider, WalletProvider};
pub use submitter::{TipAttempt, TipFailureKind, classify_provider_error, send_tip};

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use serde_json::Value;

    use super::provider::{ProviderError, WalletProvider};
    use crate::config::ChainConfig;

    /// Scripted provider: responses are consumed strictly in order and every
    /// request is logged, so tests can assert both classification and call
    /// ordering (e.g. "switch happens before any transfer").
    pub struct MockProvider {
        available: bool,
        responses: Mutex<VecDeque<(String, Result<Value, ProviderError>)>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                available: true,
                responses: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn unavailable() -> Self {
            Self {
                available: false,
                ..Self::new()
            }
        }

        pub fn expect(self, method: &str, response: Result<Value, ProviderError>) -> Self {
            self.responses
                .lock()
                .expect("mock responses poisoned")
                .push_back((method.to_string(), response));
            self
        }

        /// Shared handle so tests can keep inspecting the call log after the
        /// provider has been handed to a connector.
        pub fn shared(self) -> Arc<Self> {
            Arc::new(self)
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .expect("mock calls poisoned")
                .iter()
                .map(|(method, _)| method.clone())
                .collect()
        }

        pub fn params_of(&self, method: &str) -> Option<Value> {
            self.calls
                .lock()
                .expect("mock calls poisoned")
                .iter()
                .find(|(name, _)| name == method)
                .map(|(_, params)| params.clone())
        }
    }

    impl WalletProvider for MockProvider {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
            self.calls
                .lock()
                .expect("mock calls poisoned")
                .push((method.to_string(), params));
            let (expected, response) = self
                .responses
                .lock()
                .expect("mock responses poisoned")
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected provider request {method}"));
            assert_eq!(expected, method, "provider request out of scripted order");
            response
        }
    }

    impl WalletProvider for Arc<MockProvider> {
        fn is_available(&self) -> bool {
            self.as_ref().is_available()
        }

        async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
            self.as_ref().request(method, params).await
        }
    }

    pub fn test_chain() -> ChainConfig {
        ChainConfig {
            network: "polygon".to_string(),
            display_name: "Polygon Mainnet".to_string(),
            chain_id: 137,
            rpc_url: "http://localhost:8545".to_string(),
            request_timeout_ms: None,
            token_address: "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359".to_string(),
            token_decimals: 6,
            token_symbol: "USDC".to_string(),
            tip_amount: "100".to_string(),
            explorer_url: "https://polygonscan.com".to_string(),
            native_symbol: "POL".to_string(),
            native_decimals: 18,
            confirmation_poll_ms: Some(250),
        }
    }

    pub fn quantity_word(value: u128) -> Value {
        Value::String(format!("0x{value:064x}"))
    }
}
