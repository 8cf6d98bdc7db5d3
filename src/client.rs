//! Wallet/RPC collaborator interface
//!
//! The coordinator never talks to a node or a wallet directly. Everything goes
//! through three primitives: a read-only contract call, a write that asks the
//! wallet to sign and broadcast, and a wait for the resulting transaction to be
//! included with a given number of confirmations.

use crate::{Error, Result};
use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use std::fmt;

/// Contract methods the coordinator consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    /// `decimals() -> uint8`
    Decimals,

    /// `name() -> string`
    Name,

    /// `balanceOf(owner) -> uint256`
    BalanceOf { owner: Address },

    /// `allowance(owner, spender) -> uint256`
    Allowance { owner: Address, spender: Address },

    /// `approve(spender, amount)`
    Approve { spender: Address, amount: U256 },

    /// `airdropERC20(token, recipients, amounts, total)`
    AirdropErc20 {
        token: Address,
        recipients: Vec<Address>,
        amounts: Vec<U256>,
        total: U256,
    },
}

impl ContractCall {
    /// ABI method name
    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::Decimals => "decimals",
            ContractCall::Name => "name",
            ContractCall::BalanceOf { .. } => "balanceOf",
            ContractCall::Allowance { .. } => "allowance",
            ContractCall::Approve { .. } => "approve",
            ContractCall::AirdropErc20 { .. } => "airdropERC20",
        }
    }

    /// Whether the call changes chain state and needs a signature
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ContractCall::Approve { .. } | ContractCall::AirdropErc20 { .. }
        )
    }
}

impl fmt::Display for ContractCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// Decoded return value of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallValue {
    Uint(U256),
    Text(String),
}

impl CallValue {
    /// Expect an unsigned integer
    pub fn into_uint(self, method: &'static str) -> Result<U256> {
        match self {
            CallValue::Uint(value) => Ok(value),
            CallValue::Text(text) => Err(Error::UnexpectedReturn {
                method,
                details: format!("expected integer, got text {:?}", text),
            }),
        }
    }

    /// Expect a string
    pub fn into_text(self, method: &'static str) -> Result<String> {
        match self {
            CallValue::Text(text) => Ok(text),
            CallValue::Uint(value) => Err(Error::UnexpectedReturn {
                method,
                details: format!("expected text, got integer {}", value),
            }),
        }
    }
}

/// Handle to a signed and broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// Transaction hash
    pub hash: TxHash,

    /// Signer
    pub from: Address,

    /// Target contract
    pub to: Address,

    /// ABI method invoked
    pub method: &'static str,
}

/// Receipt of an included transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Transaction hash
    pub hash: TxHash,

    /// Block the transaction was included in
    pub block_number: u64,

    /// Execution status; `false` means the transaction reverted
    pub success: bool,
}

/// Wallet and RPC client the coordinator drives.
///
/// Implementations report a declined wallet prompt as
/// [`Error::SignatureRejected`], other signing problems as [`Error::Signing`],
/// failed reads as [`Error::ReadFailure`], and inclusion problems as
/// [`Error::InclusionTimeout`] or [`Error::InclusionReverted`].
#[async_trait]
pub trait WalletClient: Send + Sync {
    /// Execute a read-only call against `contract`
    async fn read(&self, contract: Address, call: ContractCall) -> Result<CallValue>;

    /// Ask the wallet to sign and broadcast `call` against `contract` on behalf of `from`
    async fn write(
        &self,
        from: Address,
        contract: Address,
        call: ContractCall,
    ) -> Result<PendingTransaction>;

    /// Wait until `tx` is included and has `confirmations` confirmations
    async fn wait_for_inclusion(
        &self,
        tx: &PendingTransaction,
        confirmations: u64,
    ) -> Result<TransactionReceipt>;
}
