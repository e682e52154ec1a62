//! Session state machine between the tipping page and a wallet provider.
//!
//! `Disconnected -> AccountSelected -> NetworkConfirmed -> Ready`. A network
//! switch invalidates the provider session and drops the state back to
//! `Disconnected`, so re-requesting the account before any transfer is a
//! structural requirement rather than a convention.

use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::debug;

use crate::address::strip_hex_prefix;
use crate::config::ChainConfig;
use crate::token;
use crate::wallet::provider::{ProviderError, WalletProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    AccountSelected { account: String },
    NetworkConfirmed { account: String },
    Ready { account: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Provider is on the canonical chain
    Confirmed,
    /// Switch succeeded; the session was invalidated and the account must be
    /// requested again
    SwitchedAndReset,
    /// The user declined the switch or the add-chain prompt
    Declined,
}

pub struct WalletConnector<P> {
    provider: P,
    chain: ChainConfig,
    state: SessionState,
}

impl<P: WalletProvider> WalletConnector<P> {
    pub fn new(provider: P, chain: ChainConfig) -> Self {
        Self {
            provider,
            chain,
            state: SessionState::Disconnected,
        }
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Detect a compatible provider. No side effects.
    pub fn is_provider_available(&self) -> bool {
        self.provider.is_available()
    }

    /// Ask the provider to reveal/select an account. May suspend indefinitely
    /// while the wallet UI awaits human approval; cancellation happens there,
    /// not here.
    pub async fn request_account(&mut self) -> Result<String, ProviderError> {
        let response = self
            .provider
            .request("eth_requestAccounts", json!([]))
            .await?;
        let account = response
            .get(0)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::local("Provider returned no accounts"))?;
        self.state = SessionState::AccountSelected {
            account: account.clone(),
        };
        Ok(account)
    }

    pub async fn chain_id(&self) -> Result<u64, ProviderError> {
        let response = self.provider.request("eth_chainId", json!([])).await?;
        let raw = response
            .as_str()
            .ok_or_else(|| ProviderError::local("eth_chainId returned a non-string"))?;
        u64::from_str_radix(strip_hex_prefix(raw), 16)
            .map_err(|err| ProviderError::local(format!("Failed to parse chain id {raw:?}: {err}")))
    }

    /// Compare the provider's chain against the canonical one and request a
    /// switch on mismatch, adding the chain first when the wallet does not
    /// know it. A user decline is an outcome, not an error.
    pub async fn confirm_network(&mut self) -> Result<NetworkStatus, ProviderError> {
        let account = match &self.state {
            SessionState::AccountSelected { account }
            | SessionState::NetworkConfirmed { account }
            | SessionState::Ready { account } => account.clone(),
            SessionState::Disconnected => {
                return Err(ProviderError::local(
                    "No account selected; request an account first",
                ));
            }
        };

        let current = self.chain_id().await?;
        if current == self.chain.chain_id {
            self.state = SessionState::NetworkConfirmed { account };
            return Ok(NetworkStatus::Confirmed);
        }
        debug!(
            "Provider on chain {current}, canonical chain is {}",
            self.chain.chain_id
        );

        match self.switch_chain().await {
            Ok(()) => Ok(self.reset_after_switch()),
            Err(err) if err.user_rejected() => Ok(NetworkStatus::Declined),
            Err(err) if err.unrecognized_chain() => match self.add_chain().await {
                Ok(()) => match self.switch_chain().await {
                    Ok(()) => Ok(self.reset_after_switch()),
                    Err(err) if err.user_rejected() => Ok(NetworkStatus::Declined),
                    Err(err) => Err(err),
                },
                Err(err) if err.user_rejected() => Ok(NetworkStatus::Declined),
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    fn reset_after_switch(&mut self) -> NetworkStatus {
        // The previous provider handle is not trusted across a switch.
        self.state = SessionState::Disconnected;
        NetworkStatus::SwitchedAndReset
    }

    /// Balance of the canonical tip token for `owner`, in base units.
    pub async fn token_balance(&self, owner: &str) -> Result<u128, ProviderError> {
        let data = token::balance_of_calldata(owner)
            .map_err(|err| ProviderError::local(err.to_string()))?;
        let response = self
            .provider
            .request(
                "eth_call",
                json!([{ "to": self.chain.token_address, "data": data }, "latest"]),
            )
            .await?;
        let raw = response
            .as_str()
            .ok_or_else(|| ProviderError::local("eth_call returned a non-string"))?;
        token::parse_hex_quantity(raw).map_err(|err| ProviderError::local(err.to_string()))
    }

    /// Enter `Ready`. Only reachable once the network is confirmed.
    pub fn mark_ready(&mut self) -> Result<String, ProviderError> {
        match &self.state {
            SessionState::NetworkConfirmed { account } => {
                let account = account.clone();
                self.state = SessionState::Ready {
                    account: account.clone(),
                };
                Ok(account)
            }
            other => Err(ProviderError::local(format!(
                "Session not ready for transfer (state {other:?})"
            ))),
        }
    }

    /// Submit the ERC-20 transfer and return the provider-reported hash
    /// verbatim.
    pub async fn send_transfer(
        &self,
        from: &str,
        recipient: &str,
        amount_base_units: u128,
    ) -> Result<String, ProviderError> {
        let data = token::transfer_calldata(recipient, amount_base_units)
            .map_err(|err| ProviderError::local(err.to_string()))?;
        let response = self
            .provider
            .request(
                "eth_sendTransaction",
                json!([{ "from": from, "to": self.chain.token_address, "data": data }]),
            )
            .await?;
        response
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::local("eth_sendTransaction returned a non-string hash"))
    }

    /// Wait for inclusion. One confirmation is sufficient; deep finality is
    /// out of scope. No programmatic timeout is imposed here, matching the
    /// wallet UX where cancellation belongs to the user.
    pub async fn await_inclusion(&self, tx_hash: &str) -> Result<(), ProviderError> {
        loop {
            let receipt = self
                .provider
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if !receipt.is_null() {
                return Ok(());
            }
            debug!("Transaction {tx_hash} pending inclusion");
            sleep(self.chain.confirmation_poll()).await;
        }
    }

    async fn switch_chain(&self) -> Result<(), ProviderError> {
        self.provider
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": self.chain.chain_id_hex() }]),
            )
            .await
            .map(|_| ())
    }

    async fn add_chain(&self) -> Result<(), ProviderError> {
        let descriptor = json!([{
            "chainId": self.chain.chain_id_hex(),
            "chainName": self.chain.display_name,
            "nativeCurrency": {
                "name": self.chain.native_symbol,
                "symbol": self.chain.native_symbol,
                "decimals": self.chain.native_decimals,
            },
            "rpcUrls": [self.chain.rpc_url],
            "blockExplorerUrls": [self.chain.explorer_url],
        }]);
        self.provider
            .request("wallet_addEthereumChain", descriptor)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::wallet::provider::{CODE_UNRECOGNIZED_CHAIN, CODE_USER_REJECTED};
    use crate::wallet::testing::{MockProvider, quantity_word, test_chain};

    const GUEST: &str = "0x1111111111111111111111111111111111111111";

    #[tokio::test]
    async fn account_selection_transitions_state() {
        let provider = MockProvider::new().expect("eth_requestAccounts", Ok(json!([GUEST])));
        let mut connector = WalletConnector::new(provider, test_chain());
        assert_eq!(*connector.state(), SessionState::Disconnected);

        let account = connector.request_account().await.expect("account");
        assert_eq!(account, GUEST);
        assert_eq!(
            *connector.state(),
            SessionState::AccountSelected {
                account: GUEST.to_string()
            }
        );
    }

    #[tokio::test]
    async fn confirm_network_requires_an_account() {
        let provider = MockProvider::new();
        let mut connector = WalletConnector::new(provider, test_chain());
        let err = connector.confirm_network().await.expect_err("no account");
        assert!(err.code.is_none());
    }

    #[tokio::test]
    async fn matching_chain_confirms_without_switching() {
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x89")));
        let mut connector = WalletConnector::new(provider, test_chain());
        connector.request_account().await.expect("account");

        let status = connector.confirm_network().await.expect("status");
        assert_eq!(status, NetworkStatus::Confirmed);
        assert_eq!(
            *connector.state(),
            SessionState::NetworkConfirmed {
                account: GUEST.to_string()
            }
        );
    }

    #[tokio::test]
    async fn successful_switch_resets_the_session() {
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x1")))
            .expect("wallet_switchEthereumChain", Ok(json!(null)));
        let mut connector = WalletConnector::new(provider, test_chain());
        connector.request_account().await.expect("account");

        let status = connector.confirm_network().await.expect("status");
        assert_eq!(status, NetworkStatus::SwitchedAndReset);
        assert_eq!(*connector.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn unknown_chain_is_added_before_retrying_the_switch() {
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x1")))
            .expect(
                "wallet_switchEthereumChain",
                Err(ProviderError::new(
                    CODE_UNRECOGNIZED_CHAIN,
                    "Unrecognized chain ID",
                )),
            )
            .expect("wallet_addEthereumChain", Ok(json!(null)))
            .expect("wallet_switchEthereumChain", Ok(json!(null)));
        let mut connector = WalletConnector::new(provider, test_chain());
        connector.request_account().await.expect("account");

        let status = connector.confirm_network().await.expect("status");
        assert_eq!(status, NetworkStatus::SwitchedAndReset);
    }

    #[tokio::test]
    async fn declined_switch_is_an_outcome_not_an_error() {
        let provider = MockProvider::new()
            .expect("eth_requestAccounts", Ok(json!([GUEST])))
            .expect("eth_chainId", Ok(json!("0x1")))
            .expect(
                "wallet_switchEthereumChain",
                Err(ProviderError::new(
                    CODE_USER_REJECTED,
                    "User rejected the request",
                )),
            );
        let mut connector = WalletConnector::new(provider, test_chain());
        connector.request_account().await.expect("account");

        let status = connector.confirm_network().await.expect("status");
        assert_eq!(status, NetworkStatus::Declined);
    }

    #[tokio::test]
    async fn token_balance_reads_the_canonical_contract() {
        let provider = MockProvider::new()
            .expect("eth_call", Ok(quantity_word(250_000_000)))
            .shared();
        let connector = WalletConnector::new(provider.clone(), test_chain());

        let balance = connector.token_balance(GUEST).await.expect("balance");
        assert_eq!(balance, 250_000_000);

        let params = provider.params_of("eth_call").expect("eth_call recorded");
        let call = &params[0];
        assert_eq!(call["to"], json!(test_chain().token_address));
        let data = call["data"].as_str().expect("calldata string");
        assert!(data.starts_with("0x70a08231"), "balanceOf selector");
    }

    #[tokio::test]
    async fn ready_is_only_reachable_from_network_confirmed() {
        let provider = MockProvider::new().expect("eth_requestAccounts", Ok(json!([GUEST])));
        let mut connector = WalletConnector::new(provider, test_chain());
        assert!(connector.mark_ready().is_err());

        connector.request_account().await.expect("account");
        assert!(connector.mark_ready().is_err());
    }
}
