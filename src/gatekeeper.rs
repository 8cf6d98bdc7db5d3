//! Allowance gating
//!
//! Decides whether the airdrop sender contract already holds enough allowance
//! over the owner's tokens, and whether the owner can cover the batch at all.

use crate::client::WalletClient;
use crate::token::{TokenContract, TokenMeta};
use crate::{Error, Result};
use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of an allowance check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalDecision {
    /// Allowance the spender currently holds
    pub current_allowance: U256,

    /// Amount the batch needs
    pub required: U256,
}

impl ApprovalDecision {
    /// Approval is needed iff the current allowance is below the required amount
    pub fn needs_approval(&self) -> bool {
        self.current_allowance < self.required
    }
}

/// Read-only allowance and balance checks
#[derive(Clone)]
pub struct AllowanceGatekeeper {
    client: Arc<dyn WalletClient>,
}

impl AllowanceGatekeeper {
    /// Create a new gatekeeper
    pub fn new(client: Arc<dyn WalletClient>) -> Self {
        Self { client }
    }

    fn token(&self, token: Address) -> TokenContract {
        TokenContract::new(self.client.clone(), token)
    }

    /// Allowance `spender` currently holds over `owner`'s `token`
    pub async fn current_allowance(
        &self,
        owner: Address,
        spender: Address,
        token: Address,
    ) -> Result<U256> {
        let allowance = self.token(token).allowance(owner, spender).await?;
        debug!(
            "Allowance of {} over {} for owner {}: {}",
            spender, token, owner, allowance
        );
        Ok(allowance)
    }

    /// Fetch the allowance and compare it against `total`
    pub async fn check(
        &self,
        owner: Address,
        spender: Address,
        token: Address,
        total: U256,
    ) -> Result<ApprovalDecision> {
        let current_allowance = self.current_allowance(owner, spender, token).await?;
        let decision = ApprovalDecision {
            current_allowance,
            required: total,
        };

        if decision.needs_approval() {
            info!(
                "Approval required: allowance {} below total {}",
                current_allowance, total
            );
        } else {
            debug!(
                "Existing allowance {} covers total {}",
                current_allowance, total
            );
        }

        Ok(decision)
    }

    /// Whether an approval transaction is required before transferring `total`
    pub async fn needs_approval(
        &self,
        owner: Address,
        spender: Address,
        token: Address,
        total: U256,
    ) -> Result<bool> {
        Ok(self.check(owner, spender, token, total).await?.needs_approval())
    }

    /// Verify `owner` holds at least `total` of `token`.
    ///
    /// A zero total never fails.
    pub async fn ensure_balance(
        &self,
        owner: Address,
        token: Address,
        total: U256,
    ) -> Result<U256> {
        let balance = self.token(token).balance_of(owner).await?;
        if !total.is_zero() && balance < total {
            return Err(Error::InsufficientBalance {
                required: total,
                available: balance,
            });
        }

        debug!("Balance {} covers total {}", balance, total);
        Ok(balance)
    }

    /// Snapshot of token metadata for display.
    ///
    /// Independent of any submission in flight.
    pub async fn token_meta(&self, owner: Address, token: Address) -> Result<TokenMeta> {
        self.token(token).meta(owner).await
    }
}
