//! # Airdrop Coordinator
//!
//! Transaction orchestration for batched ERC-20 airdrops through an airdrop
//! sender contract.
//!
//! This crate provides:
//! - Normalization of raw recipient/amount text into paired lists and a total
//! - Allowance gating against the sender contract for the active chain
//! - Sequencing of the optional approval and the batch transfer through
//!   signature, inclusion and confirmation
//! - Draft persistence across reloads
//! - Layered configuration and tracing setup

#![warn(missing_docs, rust_2018_idioms)]
#![forbid(unsafe_code)]
#![allow(missing_docs)] // Internal implementation details

mod error;

pub mod chain;
pub mod client;
pub mod config;
pub mod draft;
pub mod gatekeeper;
pub mod lifecycle;
pub mod logging;
pub mod normalize;
pub mod sequencer;
pub mod submission;
pub mod testing;
pub mod token;

pub use chain::{ChainEntry, ChainRegistry};
pub use client::{CallValue, ContractCall, PendingTransaction, TransactionReceipt, WalletClient};
pub use config::{load_config, AppConfig, SequencerConfig};
pub use draft::{DraftInput, DraftSession, DraftStore, JsonFileDraftStore, MemoryDraftStore};
pub use error::{Error, Result};
pub use gatekeeper::{AllowanceGatekeeper, ApprovalDecision};
pub use lifecycle::{FailureReason, SubmissionState, TransactionStatus, TransactionTracker};
pub use normalize::{normalize, NormalizedInput};
pub use sequencer::{SubmitOutcome, TransactionSequencer};
pub use submission::AirdropRequest;
pub use token::{TokenContract, TokenMeta};
