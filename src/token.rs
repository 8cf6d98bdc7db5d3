//! Typed views over the token and airdrop sender contracts

use crate::client::{ContractCall, PendingTransaction, WalletClient};
use crate::{Error, Result};
use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::debug;

/// Read-only snapshot of a token for the connected account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMeta {
    /// Token decimals
    pub decimals: u8,

    /// Token name
    pub name: String,

    /// Balance of the connected account in smallest units
    pub balance: U256,
}

impl TokenMeta {
    /// Whether the balance covers `total`
    pub fn covers(&self, total: U256) -> bool {
        total.is_zero() || self.balance >= total
    }

    /// Render a smallest-unit amount with this token's decimals
    pub fn format_amount(&self, amount: U256) -> String {
        format_units(amount, self.decimals)
    }
}

/// Render `amount` as a decimal string scaled down by `decimals`.
///
/// Trailing fractional zeros are dropped: `1500000` with 6 decimals is `1.5`.
pub fn format_units(amount: U256, decimals: u8) -> String {
    let digits = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// ERC-20 token contract
#[derive(Clone)]
pub struct TokenContract {
    client: Arc<dyn WalletClient>,
    address: Address,
}

impl TokenContract {
    /// Bind to the token at `address`
    pub fn new(client: Arc<dyn WalletClient>, address: Address) -> Self {
        Self { client, address }
    }

    /// Token address
    pub fn address(&self) -> Address {
        self.address
    }

    /// `decimals()`
    pub async fn decimals(&self) -> Result<u8> {
        let value = self
            .client
            .read(self.address, ContractCall::Decimals)
            .await?
            .into_uint("decimals")?;
        u8::try_from(value).map_err(|_| Error::UnexpectedReturn {
            method: "decimals",
            details: format!("{} does not fit in uint8", value),
        })
    }

    /// `name()`
    pub async fn name(&self) -> Result<String> {
        self.client
            .read(self.address, ContractCall::Name)
            .await?
            .into_text("name")
    }

    /// `balanceOf(owner)`
    pub async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.client
            .read(self.address, ContractCall::BalanceOf { owner })
            .await?
            .into_uint("balanceOf")
    }

    /// `allowance(owner, spender)`
    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.client
            .read(self.address, ContractCall::Allowance { owner, spender })
            .await?
            .into_uint("allowance")
    }

    /// `approve(spender, amount)` signed by `owner`
    pub async fn approve(
        &self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<PendingTransaction> {
        debug!("Requesting approval of {} for spender {}", amount, spender);
        self.client
            .write(owner, self.address, ContractCall::Approve { spender, amount })
            .await
    }

    /// Fetch decimals, name and balance concurrently
    pub async fn meta(&self, owner: Address) -> Result<TokenMeta> {
        let (decimals, name, balance) =
            tokio::try_join!(self.decimals(), self.name(), self.balance_of(owner))?;
        Ok(TokenMeta {
            decimals,
            name,
            balance,
        })
    }
}

/// Airdrop sender contract deployed on one chain
#[derive(Clone)]
pub struct AirdropSenderContract {
    client: Arc<dyn WalletClient>,
    address: Address,
}

impl AirdropSenderContract {
    /// Bind to the sender contract at `address`
    pub fn new(client: Arc<dyn WalletClient>, address: Address) -> Self {
        Self { client, address }
    }

    /// Contract address
    pub fn address(&self) -> Address {
        self.address
    }

    /// `airdropERC20(token, recipients, amounts, total)` signed by `owner`
    pub async fn airdrop_erc20(
        &self,
        owner: Address,
        token: Address,
        recipients: Vec<Address>,
        amounts: Vec<U256>,
        total: U256,
    ) -> Result<PendingTransaction> {
        debug!(
            "Requesting airdrop of {} to {} recipients via {}",
            total,
            recipients.len(),
            self.address
        );
        self.client
            .write(
                owner,
                self.address,
                ContractCall::AirdropErc20 {
                    token,
                    recipients,
                    amounts,
                    total,
                },
            )
            .await
    }
}
