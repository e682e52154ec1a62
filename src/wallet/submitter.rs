//! One token-transfer attempt per invocation, every exit path tagged.

use serde::Serialize;
use tracing::debug;

use crate::address::sanitize_wallet_address;
use crate::token::{format_token, whole_units};
use crate::wallet::connector::{NetworkStatus, WalletConnector};
use crate::wallet::provider::{ProviderError, WalletProvider};

/// Closed taxonomy of tip-submission failures. The page renders one exact,
/// actionable message per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipFailureKind {
    NoProvider,
    WrongNetwork,
    InsufficientToken,
    InsufficientGas,
    UserRejected,
    Unknown,
}

/// Outcome of a single tip attempt. This function never panics and never
/// propagates a provider exception past its boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipAttempt {
    Sent { tx_hash: String },
    Failed { kind: TipFailureKind, message: String },
}

impl TipAttempt {
    pub fn failed(kind: TipFailureKind, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
        }
    }
}

/// Translate a raw provider error into a failure kind. Ordered predicate
/// list; first match wins.
pub fn classify_provider_error(err: &ProviderError) -> TipFailureKind {
    if err.user_rejected() {
        return TipFailureKind::UserRejected;
    }
    if err.insufficient_funds() {
        return TipFailureKind::InsufficientGas;
    }
    TipFailureKind::Unknown
}

/// Execute exactly one transfer attempt of the fixed canonical tip amount to
/// `recipient_address`.
///
/// Never retries; a failed attempt is surfaced and the user decides whether
/// to try again.
pub async fn send_tip<P: WalletProvider>(
    connector: &mut WalletConnector<P>,
    recipient_address: &str,
) -> TipAttempt {
    if !connector.is_provider_available() {
        return TipAttempt::failed(
            TipFailureKind::NoProvider,
            "No compatible wallet extension was found. Install one to send tips.",
        );
    }

    let recipient = match sanitize_wallet_address(recipient_address) {
        Ok(recipient) => recipient,
        Err(err) => {
            return TipAttempt::failed(
                TipFailureKind::Unknown,
                format!("Recipient address is invalid: {err}"),
            );
        }
    };

    if let Err(err) = connector.request_account().await {
        return provider_failure(&err);
    }

    // At most one switch is expected before the chain id matches; the second
    // pass re-reads the id after the session reset.
    let mut confirmed = false;
    for _ in 0..2 {
        match connector.confirm_network().await {
            Ok(NetworkStatus::Confirmed) => {
                confirmed = true;
                break;
            }
            Ok(NetworkStatus::SwitchedAndReset) => {
                if let Err(err) = connector.request_account().await {
                    return provider_failure(&err);
                }
            }
            Ok(NetworkStatus::Declined) => return wrong_network(connector),
            Err(err) => {
                debug!("Network confirmation failed: {err}");
                return wrong_network(connector);
            }
        }
    }
    if !confirmed {
        return wrong_network(connector);
    }

    let account = match connector.mark_ready() {
        Ok(account) => account,
        Err(err) => return provider_failure(&err),
    };

    let chain = connector.chain();
    let required = match chain.unit_amount_base_units() {
        Ok(required) => required,
        Err(err) => {
            return TipAttempt::failed(
                TipFailureKind::Unknown,
                format!("Tip amount misconfigured: {err}"),
            );
        }
    };

    let balance = match connector.token_balance(&account).await {
        Ok(balance) => balance,
        Err(err) => return provider_failure(&err),
    };
    if balance < required {
        let chain = connector.chain();
        return TipAttempt::failed(
            TipFailureKind::InsufficientToken,
            format!(
                "Your balance of {} {} is below the {} required per tip",
                whole_units(balance, chain.token_decimals),
                chain.token_symbol,
                format_token(required, chain.token_decimals, &chain.token_symbol),
            ),
        );
    }

    let tx_hash = match connector.send_transfer(&account, &recipient, required).await {
        Ok(tx_hash) => tx_hash,
        Err(err) => return provider_failure(&err),
    };

    if let Err(err) = connector.await_inclusion(&tx_hash).await {
        return provider_failure(&err);
    }

    TipAttempt::Sent { tx_hash }
}

fn wrong_network<P: WalletProvider>(connector: &WalletConnector<P>) -> TipAttempt {
    TipAttempt::failed(
        TipFailureKind::WrongNetwork,
        format!(
            "Please switch your wallet to {} to send tips",
            connector.chain().display_name
        ),
    )
}

fn provider_failure(err: &ProviderError) -> TipAttempt {
    let kind = classify_provider_error(err);
    let message = match kind {
        TipFailureKind::UserRejected => "The transfer was declined in the wallet.".to_string(),
        TipFailureKind::InsufficientGas => {
            "Your wallet cannot cover the network fee for this transfer.".to_string()
        }
        _ => {
            // Raw detail stays in the logs, not in front of the guest.
            debug!("Unclassified provider error: {err}");
            "Something went wrong while sending the tip. Please try again later.".to_string()
        }
    };
    TipAttempt::failed(kind, message)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::wallet::provider::{CODE_USER_REJECTED, ProviderError};
    use crate::wallet::testing::{MockProvider, quantity_word, test_chain};

    const GUEST: &str = "0x1111111111111111111111111111111111111111";
    const RECIPIENT: &str = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01";
    const TX_HASH: &str = "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";

    fn kind_of(attempt: &TipAttempt) -> Option<TipFailureKind> {
        match attempt {
            TipAttempt::Failed { kind, .. } => Some(*kind),
            TipAttempt::Sent { .. } => None,
        }
    }

    #[tokio::test]
    async fn missing_provider_short_circuits() {
        let provider = MockProvider::unavailable();
        let mut connector = WalletConnector::new(provider, test_chain());
        let attempt = send_tip(&mut connector, RECIPIENT).await;
        assert_eq!(kind_of(&attempt), Some(TipFailureKind::NoProvider));
    }

    #[tokio::test]
    async fn balance_gate_blocks_before_any_transfer_call() {
        // Balance 99, required 100: transfer must never be invoked.
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x89")))
            .expect("eth_call", Ok(quantity_word(99_000_000)))
            .shared();
        let mut connector = WalletConnector::new(provider.clone(), test_chain());

        let attempt = send_tip(&mut connector, RECIPIENT).await;

        match attempt {
            TipAttempt::Failed { kind, message } => {
                assert_eq!(kind, TipFailureKind::InsufficientToken);
                assert!(message.contains("99"), "message must show the balance");
                assert!(
                    message.contains("100 USDC"),
                    "message must show the required amount"
                );
            }
            other => panic!("expected InsufficientToken, got {other:?}"),
        }
        assert!(
            !provider.calls().contains(&"eth_sendTransaction".to_string()),
            "transfer must not be attempted on a balance shortfall"
        );
    }

    #[tokio::test]
    async fn declined_switch_yields_wrong_network_and_no_transfer() {
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x1")))
            .expect(
                "wallet_switchEthereumChain",
                Err(ProviderError::new(
                    CODE_USER_REJECTED,
                    "User rejected the request",
                )),
            )
            .shared();
        let mut connector = WalletConnector::new(provider.clone(), test_chain());

        let attempt = send_tip(&mut connector, RECIPIENT).await;
        assert_eq!(kind_of(&attempt), Some(TipFailureKind::WrongNetwork));
        let calls = provider.calls();
        assert!(calls.contains(&"wallet_switchEthereumChain".to_string()));
        assert!(!calls.contains(&"eth_sendTransaction".to_string()));
    }

    #[tokio::test]
    async fn switch_re_requests_account_before_transfer() {
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x1")))
            .expect("wallet_switchEthereumChain", Ok(json!(null)))
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x89")))
            .expect("eth_call", Ok(quantity_word(250_000_000)))
            .expect("eth_sendTransaction", Ok(json!(TX_HASH)))
            .expect("eth_getTransactionReceipt", Ok(json!({ "status": "0x1" })))
            .shared();
        let mut connector = WalletConnector::new(provider.clone(), test_chain());

        let attempt = send_tip(&mut connector, RECIPIENT).await;
        assert_eq!(
            attempt,
            TipAttempt::Sent {
                tx_hash: TX_HASH.to_string()
            }
        );

        let calls = provider.calls();
        let switch = calls
            .iter()
            .position(|c| c == "wallet_switchEthereumChain")
            .expect("switch requested");
        let re_request = calls
            .iter()
            .rposition(|c| c == "eth_requestAccounts")
            .expect("account requested");
        let transfer = calls
            .iter()
            .position(|c| c == "eth_sendTransaction")
            .expect("transfer submitted");
        assert!(
            switch < re_request && re_request < transfer,
            "account must be re-requested after the switch and before the transfer"
        );
    }

    #[tokio::test]
    async fn signature_rejection_maps_to_user_rejected() {
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x89")))
            .expect("eth_call", Ok(quantity_word(250_000_000)))
            .expect(
                "eth_sendTransaction",
                Err(ProviderError::new(
                    CODE_USER_REJECTED,
                    "User rejected the request",
                )),
            );
        let mut connector = WalletConnector::new(provider, test_chain());

        let attempt = send_tip(&mut connector, RECIPIENT).await;
        assert_eq!(kind_of(&attempt), Some(TipFailureKind::UserRejected));
    }

    #[tokio::test]
    async fn gas_shortfall_maps_to_insufficient_gas() {
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x89")))
            .expect("eth_call", Ok(quantity_word(250_000_000)))
            .expect(
                "eth_sendTransaction",
                Err(ProviderError::new(
                    -32000,
                    "insufficient funds for gas * price + value",
                )),
            );
        let mut connector = WalletConnector::new(provider, test_chain());

        let attempt = send_tip(&mut connector, RECIPIENT).await;
        assert_eq!(kind_of(&attempt), Some(TipFailureKind::InsufficientGas));
    }

    #[tokio::test]
    async fn unrecognized_provider_errors_map_to_unknown() {
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x89")))
            .expect("eth_call", Ok(quantity_word(250_000_000)))
            .expect(
                "eth_sendTransaction",
                Err(ProviderError::local("nonce too low")),
            );
        let mut connector = WalletConnector::new(provider, test_chain());

        let attempt = send_tip(&mut connector, RECIPIENT).await;
        assert_eq!(kind_of(&attempt), Some(TipFailureKind::Unknown));
    }

    #[tokio::test]
    async fn happy_path_returns_the_provider_hash_verbatim() {
        // Guest holds 250, tip costs 100: the transfer proceeds and the hash
        // comes back untouched for use as the idempotency key.
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x89")))
            .expect("eth_call", Ok(quantity_word(250_000_000)))
            .expect("eth_sendTransaction", Ok(json!(TX_HASH)))
            .expect("eth_getTransactionReceipt", Ok(json!({ "status": "0x1" })));
        let mut connector = WalletConnector::new(provider, test_chain());

        let attempt = send_tip(&mut connector, RECIPIENT).await;
        assert_eq!(
            attempt,
            TipAttempt::Sent {
                tx_hash: TX_HASH.to_string()
            }
        );
    }

    #[test]
    fn classification_is_exhaustive_and_disjoint() {
        let rejected = ProviderError::new(CODE_USER_REJECTED, "User rejected the request");
        let gas = ProviderError::new(-32000, "insufficient funds for gas * price + value");
        let generic = ProviderError::local("internal JSON-RPC error");

        assert_eq!(
            classify_provider_error(&rejected),
            TipFailureKind::UserRejected
        );
        assert_eq!(classify_provider_error(&gas), TipFailureKind::InsufficientGas);
        assert_eq!(classify_provider_error(&generic), TipFailureKind::Unknown);

        // Rejection wins over a misleading message: the code is authoritative.
        let rejected_with_funds_message =
            ProviderError::new(CODE_USER_REJECTED, "insufficient funds");
        assert_eq!(
            classify_provider_error(&rejected_with_funds_message),
            TipFailureKind::UserRejected
        );
    }
}
