//! Submission lifecycle
//!
//! Tracks the unified submission state the sequencer surfaces, the transition
//! log of the current submission, and every transaction the sequencer has
//! broadcast from submission through confirmation.

use crate::{Error, Result};
use alloy_primitives::TxHash;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a submission ended in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Draft could not be turned into a submittable batch
    InvalidInput,

    /// No sender contract for the active chain
    NoChainConfig,

    /// Owner balance below the batch total
    InsufficientBalance,

    /// Balance or allowance could not be read
    ReadFailure,

    /// Approval prompt declined or failed
    ApprovalRejected,

    /// Approval transaction reverted or was not included in time
    ApprovalNotIncluded,

    /// Transfer prompt declined or failed
    TransferRejected,

    /// Transfer transaction reverted or was not included in time
    TransferNotIncluded,
}

impl FailureReason {
    /// Stable label for display and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InvalidInput => "invalid-input",
            FailureReason::NoChainConfig => "no-chain-config",
            FailureReason::InsufficientBalance => "insufficient-balance",
            FailureReason::ReadFailure => "read-failure",
            FailureReason::ApprovalRejected => "approval-rejected",
            FailureReason::ApprovalNotIncluded => "approval-not-included",
            FailureReason::TransferRejected => "transfer-rejected",
            FailureReason::TransferNotIncluded => "transfer-not-included",
        }
    }

    /// Failures detected before any wallet prompt
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            FailureReason::InvalidInput
                | FailureReason::NoChainConfig
                | FailureReason::InsufficientBalance
                | FailureReason::ReadFailure
        )
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified submission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    AwaitingApprovalSignature,
    AwaitingApprovalInclusion,
    AwaitingTransferSignature,
    AwaitingTransferInclusion,
    Confirmed,
    Failed(FailureReason),
}

impl SubmissionState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionState::Confirmed | SubmissionState::Failed(_))
    }

    /// Check if a wallet prompt or chain wait is outstanding
    pub fn is_awaiting(&self) -> bool {
        matches!(
            self,
            SubmissionState::AwaitingApprovalSignature
                | SubmissionState::AwaitingApprovalInclusion
                | SubmissionState::AwaitingTransferSignature
                | SubmissionState::AwaitingTransferInclusion
        )
    }

    /// Failure reason, if failed
    pub fn failure(&self) -> Option<FailureReason> {
        match self {
            SubmissionState::Failed(reason) => Some(*reason),
            _ => None,
        }
    }

    fn kind(&self) -> StateKind {
        match self {
            SubmissionState::Idle => StateKind::Idle,
            SubmissionState::AwaitingApprovalSignature => StateKind::ApprovalSignature,
            SubmissionState::AwaitingApprovalInclusion => StateKind::ApprovalInclusion,
            SubmissionState::AwaitingTransferSignature => StateKind::TransferSignature,
            SubmissionState::AwaitingTransferInclusion => StateKind::TransferInclusion,
            SubmissionState::Confirmed => StateKind::Confirmed,
            SubmissionState::Failed(_) => StateKind::Failed,
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionState::Idle => write!(f, "Idle"),
            SubmissionState::AwaitingApprovalSignature => write!(f, "AwaitingApprovalSignature"),
            SubmissionState::AwaitingApprovalInclusion => write!(f, "AwaitingApprovalInclusion"),
            SubmissionState::AwaitingTransferSignature => write!(f, "AwaitingTransferSignature"),
            SubmissionState::AwaitingTransferInclusion => write!(f, "AwaitingTransferInclusion"),
            SubmissionState::Confirmed => write!(f, "Confirmed"),
            SubmissionState::Failed(reason) => write!(f, "Failed({})", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateKind {
    Idle,
    ApprovalSignature,
    ApprovalInclusion,
    TransferSignature,
    TransferInclusion,
    Confirmed,
    Failed,
}

const VALID_TRANSITIONS: &[(StateKind, StateKind)] = &[
    (StateKind::Idle, StateKind::ApprovalSignature),
    (StateKind::Idle, StateKind::TransferSignature),
    (StateKind::Idle, StateKind::Failed),
    (StateKind::ApprovalSignature, StateKind::ApprovalInclusion),
    (StateKind::ApprovalSignature, StateKind::Failed),
    (StateKind::ApprovalInclusion, StateKind::TransferSignature),
    (StateKind::ApprovalInclusion, StateKind::Failed),
    (StateKind::TransferSignature, StateKind::TransferInclusion),
    (StateKind::TransferSignature, StateKind::Failed),
    (StateKind::TransferInclusion, StateKind::Confirmed),
    (StateKind::TransferInclusion, StateKind::Failed),
    (StateKind::Confirmed, StateKind::Idle),
    (StateKind::Failed, StateKind::Idle),
];

/// Check that `from -> to` is a legal move
pub fn validate_transition(from: &SubmissionState, to: &SubmissionState) -> Result<()> {
    if VALID_TRANSITIONS.contains(&(from.kind(), to.kind())) {
        Ok(())
    } else {
        Err(Error::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: SubmissionState,
    pub to: SubmissionState,
    /// Unix milliseconds
    pub at: u64,
}

/// Record of the current (or most recent) submission
#[derive(Debug, Clone, Default)]
pub struct SubmissionLog {
    /// State changes in order
    pub transitions: Vec<StateTransition>,

    /// Approval transaction, if one was broadcast
    pub approval: Option<TxHash>,

    /// Transfer transaction, if one was broadcast
    pub transfer: Option<TxHash>,

    /// Error behind the terminal failure, if any
    pub error: Option<Error>,
}

impl SubmissionLog {
    /// States entered, in order
    pub fn states(&self) -> Vec<SubmissionState> {
        self.transitions.iter().map(|t| t.to).collect()
    }
}

/// Which step of the sequence a transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Approval,
    Transfer,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Approval => write!(f, "approval"),
            TransactionKind::Transfer => write!(f, "transfer"),
        }
    }
}

/// Status of a broadcast transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Broadcast, waiting for inclusion
    Pending,

    /// Included with the required confirmations
    Confirmed,

    /// Included but reverted
    Reverted,

    /// Not included before the timeout
    TimedOut,

    /// Outcome never observed (the wait failed or was abandoned)
    Unknown,
}

impl TransactionStatus {
    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Confirmed => write!(f, "Confirmed"),
            TransactionStatus::Reverted => write!(f, "Reverted"),
            TransactionStatus::TimedOut => write!(f, "TimedOut"),
            TransactionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Lifecycle information for one broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTransaction {
    /// Transaction hash
    pub hash: TxHash,

    /// Approval or transfer
    pub kind: TransactionKind,

    /// Current status
    pub status: TransactionStatus,

    /// Broadcast timestamp (Unix milliseconds)
    pub submitted_at: u64,

    /// Finalization timestamp (Unix milliseconds, if finalized)
    pub finalized_at: Option<u64>,

    /// Block the transaction was included in
    pub block_number: Option<u64>,
}

impl TrackedTransaction {
    fn new_pending(hash: TxHash, kind: TransactionKind, submitted_at: u64) -> Self {
        Self {
            hash,
            kind,
            status: TransactionStatus::Pending,
            submitted_at,
            finalized_at: None,
            block_number: None,
        }
    }

    /// Time from broadcast to finalization (milliseconds)
    pub fn total_time_ms(&self) -> Option<u64> {
        self.finalized_at
            .map(|fin| fin.saturating_sub(self.submitted_at))
    }
}

/// Default cap on tracked transactions
pub const DEFAULT_MAX_TRACKED: usize = 1_000;

/// Registry of every transaction the sequencer has broadcast
pub struct TransactionTracker {
    transactions: Arc<DashMap<TxHash, TrackedTransaction>>,

    /// Finalized entries are evicted once this many are tracked
    max_tracked: usize,

    /// Current time provider (for testing)
    current_time_fn: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionTracker {
    /// Create a new tracker
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(DashMap::new()),
            max_tracked: DEFAULT_MAX_TRACKED,
            current_time_fn: Box::new(unix_millis),
        }
    }

    /// Set the capacity (at least one entry)
    pub fn with_max_tracked(mut self, max_tracked: usize) -> Self {
        self.max_tracked = max_tracked.max(1);
        self
    }

    /// Set the current time function (for testing)
    pub fn with_time_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.current_time_fn = Box::new(f);
        self
    }

    /// Current time in Unix milliseconds
    pub fn now(&self) -> u64 {
        (self.current_time_fn)()
    }

    /// Register a broadcast transaction.
    ///
    /// At capacity the oldest finalized entries make room. Pending entries
    /// are never evicted, so the cap can be exceeded while they are in flight.
    pub fn register_pending(&self, hash: TxHash, kind: TransactionKind) {
        if self.transactions.len() >= self.max_tracked {
            self.evict_finalized(self.transactions.len() + 1 - self.max_tracked);
            if self.transactions.len() >= self.max_tracked {
                warn!(
                    "Transaction tracker over capacity ({} >= {})",
                    self.transactions.len(),
                    self.max_tracked
                );
            }
        }

        let timestamp = self.now();
        self.transactions
            .insert(hash, TrackedTransaction::new_pending(hash, kind, timestamp));
        debug!("Registered pending {} transaction: {}", kind, hash);
    }

    /// Drop up to `count` finalized entries, oldest first
    fn evict_finalized(&self, count: usize) -> usize {
        let mut finalized: Vec<(u64, TxHash)> = self
            .transactions
            .iter()
            .filter_map(|entry| entry.value().finalized_at.map(|at| (at, *entry.key())))
            .collect();
        finalized.sort_unstable();

        let mut evicted = 0;
        for (_, hash) in finalized.into_iter().take(count) {
            if self.transactions.remove(&hash).is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!("Evicted {} finalized transactions", evicted);
        }
        evicted
    }

    fn finalize(
        &self,
        hash: &TxHash,
        status: TransactionStatus,
        block_number: Option<u64>,
    ) -> Result<()> {
        let timestamp = self.now();
        let mut tracked = self
            .transactions
            .get_mut(hash)
            .ok_or_else(|| Error::Internal(format!("Transaction not tracked: {}", hash)))?;

        tracked.status = status;
        tracked.finalized_at = Some(timestamp);
        if block_number.is_some() {
            tracked.block_number = block_number;
        }
        Ok(())
    }

    /// Mark a transaction as confirmed in `block_number`
    pub fn mark_confirmed(&self, hash: &TxHash, block_number: u64) -> Result<()> {
        self.finalize(hash, TransactionStatus::Confirmed, Some(block_number))?;
        info!("Transaction {} confirmed in block {}", hash, block_number);
        Ok(())
    }

    /// Mark a transaction as reverted
    pub fn mark_reverted(&self, hash: &TxHash) -> Result<()> {
        self.finalize(hash, TransactionStatus::Reverted, None)?;
        warn!("Transaction {} reverted", hash);
        Ok(())
    }

    /// Mark a transaction as not included in time
    pub fn mark_timed_out(&self, hash: &TxHash) -> Result<()> {
        self.finalize(hash, TransactionStatus::TimedOut, None)?;
        warn!("Transaction {} not included in time", hash);
        Ok(())
    }

    /// Mark a transaction whose outcome was never observed
    pub fn mark_unknown(&self, hash: &TxHash) -> Result<()> {
        self.finalize(hash, TransactionStatus::Unknown, None)?;
        warn!("Transaction {} outcome unknown", hash);
        Ok(())
    }

    /// Number of tracked transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Get transaction status
    pub fn get_status(&self, hash: &TxHash) -> Option<TransactionStatus> {
        self.transactions.get(hash).map(|tracked| tracked.status)
    }

    /// Get transaction record
    pub fn get(&self, hash: &TxHash) -> Option<TrackedTransaction> {
        self.transactions.get(hash).map(|tracked| tracked.clone())
    }

    /// Hashes of every transaction still waiting for inclusion
    pub fn pending(&self) -> Vec<TxHash> {
        self.transactions
            .iter()
            .filter(|entry| entry.value().status == TransactionStatus::Pending)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Remove finalized transactions older than the given age (milliseconds)
    pub fn prune_finalized(&self, max_age_ms: u64) -> usize {
        let cutoff_time = self.now().saturating_sub(max_age_ms);
        let before = self.transactions.len();

        self.transactions.retain(|_, tracked| {
            !(tracked.status.is_terminal()
                && tracked.finalized_at.map(|t| t < cutoff_time).unwrap_or(false))
        });

        let count = before.saturating_sub(self.transactions.len());
        if count > 0 {
            debug!("Pruned {} finalized transactions", count);
        }
        count
    }

    /// Get statistics about tracked transactions
    pub fn get_statistics(&self) -> TrackerStatistics {
        let mut stats = TrackerStatistics::default();

        for entry in self.transactions.iter() {
            let tracked = entry.value();
            match tracked.status {
                TransactionStatus::Pending => stats.pending_count += 1,
                TransactionStatus::Confirmed => stats.confirmed_count += 1,
                TransactionStatus::Reverted => stats.reverted_count += 1,
                TransactionStatus::TimedOut => stats.timed_out_count += 1,
                TransactionStatus::Unknown => stats.unknown_count += 1,
            }
            if let Some(time) = tracked.total_time_ms() {
                stats.total_latency_ms += time;
                stats.latency_sample_count += 1;
            }
        }

        stats.total_count = self.transactions.len();
        stats
    }
}

/// Tracker statistics
#[derive(Debug, Clone, Default)]
pub struct TrackerStatistics {
    pub total_count: usize,
    pub pending_count: usize,
    pub confirmed_count: usize,
    pub reverted_count: usize,
    pub timed_out_count: usize,
    pub unknown_count: usize,
    pub total_latency_ms: u64,
    pub latency_sample_count: usize,
}

impl TrackerStatistics {
    /// Get average broadcast-to-finalization latency (milliseconds)
    pub fn average_latency_ms(&self) -> Option<f64> {
        if self.latency_sample_count > 0 {
            Some(self.total_latency_ms as f64 / self.latency_sample_count as f64)
        } else {
            None
        }
    }
}

pub(crate) fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
