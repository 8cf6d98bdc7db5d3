//! Error types for the airdrop coordinator

use alloy_primitives::U256;
use thiserror::Error;

/// Coordinator error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An amount entry is not a non-negative integer in smallest units
    #[error("Invalid amount format: {0:?}")]
    InvalidAmountFormat(String),

    /// A token or recipient entry is not a valid address
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),

    /// Recipient and amount lists cannot be paired positionally
    #[error("Recipient/amount count mismatch: {recipients} recipients, {amounts} amounts")]
    LengthMismatch { recipients: usize, amounts: usize },

    /// Nothing to send
    #[error("Airdrop batch is empty")]
    EmptyBatch,

    /// Summed amounts do not fit in 256 bits
    #[error("Total amount overflows 256 bits")]
    AmountOverflow,

    /// No airdrop sender contract is configured for the chain
    #[error("No airdrop sender contract configured for chain {0}")]
    MissingChainConfig(u64),

    /// Owner balance does not cover the total
    #[error("Insufficient token balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },

    /// The user declined the wallet prompt
    #[error("Signature rejected: {0}")]
    SignatureRejected(String),

    /// The wallet failed to sign or broadcast
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The wallet prompt was not answered in time
    #[error("Signature request timed out after {0} ms")]
    SignatureTimeout(u64),

    /// The transaction was not included in time
    #[error("Transaction {hash} not included after {timeout_ms} ms")]
    InclusionTimeout { hash: String, timeout_ms: u64 },

    /// The transaction was included but reverted
    #[error("Transaction {0} reverted")]
    InclusionReverted(String),

    /// The caller dropped the submission before it finished
    #[error("Submission cancelled while {0}")]
    Cancelled(String),

    /// A contract read failed
    #[error("Contract read failed: {0}")]
    ReadFailure(String),

    /// A contract read returned a value of the wrong shape
    #[error("Unexpected return value from {method}: {details}")]
    UnexpectedReturn { method: &'static str, details: String },

    /// Draft persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Submission state machine was asked to make an illegal move
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
