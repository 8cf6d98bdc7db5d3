//! Airdrop transaction sequencer
//!
//! Issues at most one approval transaction followed by exactly one
//! `airdropERC20` transaction, waiting for each to be confirmed before moving
//! on, and publishes a single [`SubmissionState`] for the caller to observe.

use crate::chain::ChainRegistry;
use crate::client::{PendingTransaction, TransactionReceipt, WalletClient};
use crate::config::SequencerConfig;
use crate::draft::DraftInput;
use crate::gatekeeper::AllowanceGatekeeper;
use crate::lifecycle::{
    validate_transition, FailureReason, StateTransition, SubmissionLog, SubmissionState,
    TransactionKind, TransactionTracker,
};
use crate::submission::AirdropRequest;
use crate::token::{AirdropSenderContract, TokenContract, TokenMeta};
use crate::{Error, Result};
use alloy_primitives::Address;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Result of a submit call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A sequence was already in flight; nothing was done
    Ignored,

    /// The sequence ran to this terminal state
    Finished(SubmissionState),
}

/// Held for the length of a submit or reset.
///
/// Dropping it mid-sequence (a cancelled future or an escaped error) fails
/// the submission before releasing the state machine.
struct InFlightGuard<'a>(&'a TransactionSequencer);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.abandon();
        self.0.in_flight.store(false, Ordering::Release);
    }
}

/// Per-step wiring for approval and transfer
struct Step {
    kind: TransactionKind,
    signing: SubmissionState,
    including: SubmissionState,
    rejected: FailureReason,
    not_included: FailureReason,
}

const APPROVAL_STEP: Step = Step {
    kind: TransactionKind::Approval,
    signing: SubmissionState::AwaitingApprovalSignature,
    including: SubmissionState::AwaitingApprovalInclusion,
    rejected: FailureReason::ApprovalRejected,
    not_included: FailureReason::ApprovalNotIncluded,
};

const TRANSFER_STEP: Step = Step {
    kind: TransactionKind::Transfer,
    signing: SubmissionState::AwaitingTransferSignature,
    including: SubmissionState::AwaitingTransferInclusion,
    rejected: FailureReason::TransferRejected,
    not_included: FailureReason::TransferNotIncluded,
};

/// Transaction sequencer
///
/// Owns the submission state exclusively. Callers observe it through
/// [`TransactionSequencer::subscribe`] and drive it only through `submit` and
/// `reset`.
pub struct TransactionSequencer {
    /// Configuration
    config: SequencerConfig,

    /// Wallet/RPC collaborator
    client: Arc<dyn WalletClient>,

    /// Allowance and balance checks
    gatekeeper: AllowanceGatekeeper,

    /// Chain id to sender contract table
    chains: ChainRegistry,

    /// Published submission state
    state: watch::Sender<SubmissionState>,

    /// Record of the current submission
    log: Mutex<SubmissionLog>,

    /// Every broadcast transaction
    tracker: TransactionTracker,

    /// Set while a submit or reset holds the state machine
    in_flight: AtomicBool,
}

impl TransactionSequencer {
    /// Create a new sequencer
    pub fn new(
        config: SequencerConfig,
        client: Arc<dyn WalletClient>,
        chains: ChainRegistry,
    ) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        let tracker = TransactionTracker::new().with_max_tracked(config.max_tracked_transactions);
        Self {
            config,
            gatekeeper: AllowanceGatekeeper::new(client.clone()),
            client,
            chains,
            state,
            log: Mutex::new(SubmissionLog::default()),
            tracker,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Replace the transaction tracker (for testing)
    pub fn with_tracker(mut self, tracker: TransactionTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Current state
    pub fn state(&self) -> SubmissionState {
        *self.state.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    /// Whether a submission is currently running
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Record of the current or most recent submission
    pub fn log(&self) -> SubmissionLog {
        self.lock_log().clone()
    }

    /// States entered by the current or most recent submission
    pub fn transitions(&self) -> Vec<SubmissionState> {
        self.lock_log().states()
    }

    /// Error behind the most recent failure
    pub fn last_error(&self) -> Option<Error> {
        self.lock_log().error.clone()
    }

    /// Broadcast transactions
    pub fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }

    /// Allowance and balance checks used by this sequencer
    pub fn gatekeeper(&self) -> &AllowanceGatekeeper {
        &self.gatekeeper
    }

    /// Token metadata for display; never touches the submission state
    pub async fn token_meta(&self, owner: Address, token: Address) -> Result<TokenMeta> {
        self.gatekeeper.token_meta(owner, token).await
    }

    /// Return a terminal state to `Idle`.
    ///
    /// Returns `false` when there was nothing to reset or a submission is in flight.
    pub fn reset(&self) -> Result<bool> {
        let _guard = match self.try_begin() {
            Some(guard) => guard,
            None => return Ok(false),
        };
        if !self.state().is_terminal() {
            return Ok(false);
        }
        self.transition(SubmissionState::Idle)?;
        Ok(true)
    }

    /// Normalize a draft and submit it.
    ///
    /// Input that cannot be submitted ends in `Failed(invalid-input)` without
    /// any chain read or wallet prompt.
    pub async fn submit_draft(
        &self,
        chain_id: u64,
        owner: Address,
        draft: &DraftInput,
    ) -> Result<SubmitOutcome> {
        let _guard = match self.try_begin() {
            Some(guard) => guard,
            None => return Ok(self.ignored()),
        };
        self.start_submission()?;

        let state = match AirdropRequest::from_draft(chain_id, owner, draft) {
            Ok(request) => self.run(request).await?,
            Err(e) => self.fail(FailureReason::InvalidInput, e)?,
        };
        Ok(SubmitOutcome::Finished(state))
    }

    /// Submit an airdrop.
    ///
    /// The request is a snapshot: later edits to the draft do not affect a
    /// sequence already running. A call made while another sequence is in
    /// flight returns [`SubmitOutcome::Ignored`] and changes nothing.
    pub async fn submit(&self, request: AirdropRequest) -> Result<SubmitOutcome> {
        let _guard = match self.try_begin() {
            Some(guard) => guard,
            None => return Ok(self.ignored()),
        };
        self.start_submission()?;

        let state = self.run(request).await?;
        Ok(SubmitOutcome::Finished(state))
    }

    fn ignored(&self) -> SubmitOutcome {
        debug!("Submission in flight ({}); ignoring submit", self.state());
        SubmitOutcome::Ignored
    }

    fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(self))
    }

    /// Fail a submission left in an `Awaiting*` state
    fn abandon(&self) {
        let (step, hash) = match self.state() {
            SubmissionState::AwaitingApprovalSignature => (&APPROVAL_STEP, None),
            SubmissionState::AwaitingTransferSignature => (&TRANSFER_STEP, None),
            SubmissionState::AwaitingApprovalInclusion => {
                (&APPROVAL_STEP, self.lock_log().approval)
            }
            SubmissionState::AwaitingTransferInclusion => {
                (&TRANSFER_STEP, self.lock_log().transfer)
            }
            _ => return,
        };

        let (reason, stage) = match hash {
            Some(hash) => {
                if let Err(e) = self.tracker.mark_unknown(&hash) {
                    error!("Failed to finalize abandoned transaction {}: {}", hash, e);
                }
                (step.not_included, "inclusion")
            }
            None => (step.rejected, "signature"),
        };
        let cancelled = Error::Cancelled(format!("waiting for {} {}", step.kind, stage));
        if let Err(e) = self.fail(reason, cancelled) {
            error!("Failed to record cancelled submission: {}", e);
        }
    }

    fn lock_log(&self) -> MutexGuard<'_, SubmissionLog> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn start_submission(&self) -> Result<()> {
        if self.state().is_terminal() {
            self.transition(SubmissionState::Idle)?;
        }
        *self.lock_log() = SubmissionLog::default();
        Ok(())
    }

    fn transition(&self, to: SubmissionState) -> Result<()> {
        let from = self.state();
        validate_transition(&from, &to).map_err(|e| {
            error!("Rejected submission state change {} -> {}", from, to);
            e
        })?;

        self.state.send_replace(to);
        self.lock_log().transitions.push(StateTransition {
            from,
            to,
            at: self.tracker.now(),
        });
        debug!("Submission state: {} -> {}", from, to);
        Ok(())
    }

    fn fail(&self, reason: FailureReason, error: Error) -> Result<SubmissionState> {
        warn!("Airdrop submission failed ({}): {}", reason, error);
        self.lock_log().error = Some(error);
        let state = SubmissionState::Failed(reason);
        self.transition(state)?;
        Ok(state)
    }

    async fn run(&self, request: AirdropRequest) -> Result<SubmissionState> {
        info!(
            "Submitting airdrop of {} to {} recipients on chain {}",
            request.total,
            request.len(),
            request.chain_id
        );

        // Step 1: Resolve sender contract
        let spender = match self.chains.resolve_sender(request.chain_id) {
            Ok(spender) => spender,
            Err(e) => return self.fail(FailureReason::NoChainConfig, e),
        };

        // Step 2: Balance must cover the batch before anything is signed
        match self
            .gatekeeper
            .ensure_balance(request.owner, request.token, request.total)
            .await
        {
            Ok(_) => {}
            Err(e @ Error::InsufficientBalance { .. }) => {
                return self.fail(FailureReason::InsufficientBalance, e)
            }
            Err(e) => return self.fail(FailureReason::ReadFailure, e),
        }

        // Step 3: Check the current allowance
        let decision = match self
            .gatekeeper
            .check(request.owner, spender, request.token, request.total)
            .await
        {
            Ok(decision) => decision,
            Err(e) => return self.fail(FailureReason::ReadFailure, e),
        };

        // Step 4: Approve exactly the total when the allowance falls short
        if decision.needs_approval() {
            let token = TokenContract::new(self.client.clone(), request.token);
            let approval = token.approve(request.owner, spender, request.total);
            if self.execute_step(&APPROVAL_STEP, approval).await?.is_none() {
                return Ok(self.state());
            }
        }

        // Step 5: Batch transfer
        let sender = AirdropSenderContract::new(self.client.clone(), spender);
        let transfer = sender.airdrop_erc20(
            request.owner,
            request.token,
            request.recipients.clone(),
            request.amounts.clone(),
            request.total,
        );
        let receipt = match self.execute_step(&TRANSFER_STEP, transfer).await? {
            Some(receipt) => receipt,
            None => return Ok(self.state()),
        };

        self.transition(SubmissionState::Confirmed)?;
        info!(
            "Airdrop {} confirmed in block {}",
            receipt.hash, receipt.block_number
        );
        Ok(SubmissionState::Confirmed)
    }

    /// Sign, broadcast and confirm one transaction.
    ///
    /// Returns `None` once the submission has been moved to a failed state.
    async fn execute_step<F>(&self, step: &Step, sign: F) -> Result<Option<TransactionReceipt>>
    where
        F: Future<Output = Result<PendingTransaction>>,
    {
        self.transition(step.signing)?;

        let pending = match timeout(self.config.signature_timeout(), sign).await {
            Ok(Ok(pending)) => pending,
            Ok(Err(e)) => {
                self.fail(step.rejected, e)?;
                return Ok(None);
            }
            Err(_) => {
                self.fail(
                    step.rejected,
                    Error::SignatureTimeout(self.config.signature_timeout_ms),
                )?;
                return Ok(None);
            }
        };

        let hash = pending.hash;
        self.tracker.register_pending(hash, step.kind);
        {
            let mut log = self.lock_log();
            match step.kind {
                TransactionKind::Approval => log.approval = Some(hash),
                TransactionKind::Transfer => log.transfer = Some(hash),
            }
        }
        info!("{} transaction {} broadcast", step.kind, hash);

        self.transition(step.including)?;

        let inclusion = self
            .client
            .wait_for_inclusion(&pending, self.config.confirmations);
        let error = match timeout(self.config.inclusion_timeout(), inclusion).await {
            Ok(Ok(receipt)) if receipt.success => {
                self.tracker.mark_confirmed(&hash, receipt.block_number)?;
                return Ok(Some(receipt));
            }
            Ok(Ok(_)) => {
                self.tracker.mark_reverted(&hash)?;
                Error::InclusionReverted(hash.to_string())
            }
            Ok(Err(e @ Error::InclusionReverted(_))) => {
                self.tracker.mark_reverted(&hash)?;
                e
            }
            Ok(Err(e @ Error::InclusionTimeout { .. })) => {
                self.tracker.mark_timed_out(&hash)?;
                e
            }
            Ok(Err(e)) => {
                self.tracker.mark_unknown(&hash)?;
                e
            }
            Err(_) => {
                self.tracker.mark_timed_out(&hash)?;
                Error::InclusionTimeout {
                    hash: hash.to_string(),
                    timeout_ms: self.config.inclusion_timeout_ms,
                }
            }
        };

        self.fail(step.not_included, error)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainEntry;
    use crate::client::ContractCall;
    use crate::lifecycle::TransactionStatus;
    use crate::testing::ScriptedWallet;
    use alloy_primitives::{address, U256};
    use std::time::Duration;

    const CHAIN_ID: u64 = 31337;
    const TOKEN: Address = address!("00000000000000000000000000000000000000aa");
    const OWNER: Address = address!("0000000000000000000000000000000000000001");
    const SENDER: Address = address!("00000000000000000000000000000000000000ff");
    const ALICE: Address = address!("000000000000000000000000000000000000a11c");
    const BOB: Address = address!("0000000000000000000000000000000000000b0b");

    fn wallet(balance: u64, allowance: u64) -> Arc<ScriptedWallet> {
        Arc::new(
            ScriptedWallet::new()
                .with_token(TOKEN, "Mock Token", 18)
                .with_balance(TOKEN, OWNER, U256::from(balance))
                .with_allowance(TOKEN, OWNER, SENDER, U256::from(allowance)),
        )
    }

    fn sequencer(wallet: &Arc<ScriptedWallet>) -> TransactionSequencer {
        let chains = ChainRegistry::from_entries(vec![ChainEntry {
            chain_id: CHAIN_ID,
            name: "anvil".into(),
            sender: SENDER,
        }]);
        TransactionSequencer::new(SequencerConfig::default(), wallet.clone(), chains)
    }

    fn request(first: u64, second: u64) -> AirdropRequest {
        AirdropRequest {
            chain_id: CHAIN_ID,
            owner: OWNER,
            token: TOKEN,
            recipients: vec![ALICE, BOB],
            amounts: vec![U256::from(first), U256::from(second)],
            total: U256::from(first + second),
        }
    }

    #[tokio::test]
    async fn test_insufficient_balance_issues_no_prompt() {
        let wallet = wallet(50, 0);
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(30, 30)).await.unwrap();

        let failed = SubmissionState::Failed(FailureReason::InsufficientBalance);
        assert_eq!(outcome, SubmitOutcome::Finished(failed));
        assert_eq!(sequencer.transitions(), vec![failed]);
        assert!(wallet.writes().is_empty());
        assert_eq!(
            sequencer.last_error(),
            Some(Error::InsufficientBalance {
                required: U256::from(60u64),
                available: U256::from(50u64),
            })
        );
    }

    #[tokio::test]
    async fn test_full_sequence_with_exact_approval() {
        let wallet = wallet(1_000, 0);
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(40, 60)).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Finished(SubmissionState::Confirmed));
        assert_eq!(
            sequencer.transitions(),
            vec![
                SubmissionState::AwaitingApprovalSignature,
                SubmissionState::AwaitingApprovalInclusion,
                SubmissionState::AwaitingTransferSignature,
                SubmissionState::AwaitingTransferInclusion,
                SubmissionState::Confirmed,
            ]
        );

        let writes = wallet.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].to, TOKEN);
        assert_eq!(
            writes[0].call,
            ContractCall::Approve {
                spender: SENDER,
                amount: U256::from(100u64),
            }
        );
        assert_eq!(writes[1].to, SENDER);
        assert_eq!(
            writes[1].call,
            ContractCall::AirdropErc20 {
                token: TOKEN,
                recipients: vec![ALICE, BOB],
                amounts: vec![U256::from(40u64), U256::from(60u64)],
                total: U256::from(100u64),
            }
        );

        assert_eq!(wallet.balance(TOKEN, ALICE), U256::from(40u64));
        assert_eq!(wallet.balance(TOKEN, BOB), U256::from(60u64));
        assert_eq!(wallet.balance(TOKEN, OWNER), U256::from(900u64));
        assert_eq!(wallet.allowance(TOKEN, OWNER, SENDER), U256::ZERO);

        let log = sequencer.log();
        let approval = log.approval.unwrap();
        let transfer = log.transfer.unwrap();
        assert_eq!(
            sequencer.tracker().get_status(&approval),
            Some(TransactionStatus::Confirmed)
        );
        assert_eq!(
            sequencer.tracker().get(&transfer).unwrap().kind,
            TransactionKind::Transfer
        );
    }

    #[tokio::test]
    async fn test_sufficient_allowance_skips_approval() {
        let wallet = wallet(1_000, 100);
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(50, 50)).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Finished(SubmissionState::Confirmed));
        assert_eq!(
            sequencer.transitions(),
            vec![
                SubmissionState::AwaitingTransferSignature,
                SubmissionState::AwaitingTransferInclusion,
                SubmissionState::Confirmed,
            ]
        );
        let writes = wallet.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].call.method(), "airdropERC20");
        assert_eq!(sequencer.log().approval, None);
    }

    #[tokio::test]
    async fn test_submit_while_in_flight_is_ignored() {
        let wallet = wallet(1_000, 100);
        let gate = wallet.hold_inclusion();
        let sequencer = sequencer(&wallet);
        let mut status = sequencer.subscribe();

        let first = sequencer.submit(request(50, 50));
        let second = async {
            let _ = status
                .wait_for(|state| *state == SubmissionState::AwaitingTransferInclusion)
                .await
                .unwrap();

            let outcome = sequencer.submit(request(50, 50)).await.unwrap();
            assert_eq!(outcome, SubmitOutcome::Ignored);
            assert!(!sequencer.reset().unwrap());

            // display refresh runs alongside the sequence
            let meta = sequencer.token_meta(OWNER, TOKEN).await.unwrap();
            assert_eq!(meta.name, "Mock Token");

            assert_eq!(sequencer.state(), SubmissionState::AwaitingTransferInclusion);
            assert_eq!(wallet.writes().len(), 1);
            gate.notify_one();
        };

        let (first, ()) = tokio::join!(first, second);
        assert_eq!(
            first.unwrap(),
            SubmitOutcome::Finished(SubmissionState::Confirmed)
        );
        assert_eq!(wallet.writes().len(), 1);
        assert!(!sequencer.is_in_flight());
    }

    #[tokio::test]
    async fn test_missing_chain_config() {
        let wallet = wallet(1_000, 0);
        let sequencer = sequencer(&wallet);
        let mut unsupported = request(1, 1);
        unsupported.chain_id = 1;

        let outcome = sequencer.submit(unsupported).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::NoChainConfig))
        );
        assert_eq!(sequencer.last_error(), Some(Error::MissingChainConfig(1)));
        assert_eq!(wallet.read_count(), 0);
        assert!(wallet.writes().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure() {
        let wallet = wallet(1_000, 0);
        wallet.fail_reads("rpc unavailable");
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(1, 1)).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::ReadFailure))
        );
        assert!(wallet.writes().is_empty());
    }

    #[tokio::test]
    async fn test_approval_rejected() {
        let wallet = wallet(1_000, 0);
        wallet.reject("approve");
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(10, 10)).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::ApprovalRejected))
        );
        assert_eq!(
            sequencer.transitions(),
            vec![
                SubmissionState::AwaitingApprovalSignature,
                SubmissionState::Failed(FailureReason::ApprovalRejected),
            ]
        );
        assert!(matches!(
            sequencer.last_error(),
            Some(Error::SignatureRejected(_))
        ));
        assert_eq!(wallet.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_approval_reverted() {
        let wallet = wallet(1_000, 0);
        wallet.revert("approve");
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(10, 10)).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::ApprovalNotIncluded))
        );
        let approval = sequencer.log().approval.unwrap();
        assert_eq!(
            sequencer.tracker().get_status(&approval),
            Some(TransactionStatus::Reverted)
        );
        assert_eq!(wallet.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_rejected() {
        let wallet = wallet(1_000, 100);
        wallet.reject("airdropERC20");
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(50, 50)).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::TransferRejected))
        );
    }

    #[tokio::test]
    async fn test_included_approval_survives_failed_transfer() {
        let wallet = wallet(1_000, 0);
        wallet.revert("airdropERC20");
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(50, 50)).await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::TransferNotIncluded))
        );
        assert_eq!(wallet.allowance(TOKEN, OWNER, SENDER), U256::from(100u64));

        // the retry re-checks the allowance instead of approving again
        let _ = sequencer.submit(request(50, 50)).await.unwrap();
        let methods: Vec<_> = wallet.writes().iter().map(|w| w.call.method()).collect();
        assert_eq!(methods, vec!["approve", "airdropERC20", "airdropERC20"]);
        assert_eq!(
            sequencer.transitions().first(),
            Some(&SubmissionState::AwaitingTransferSignature)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_prompt_times_out() {
        let wallet = wallet(1_000, 0);
        wallet.stall("approve");
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(10, 10)).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::ApprovalRejected))
        );
        assert_eq!(
            sequencer.last_error(),
            Some(Error::SignatureTimeout(
                SequencerConfig::default().signature_timeout_ms
            ))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_inclusion_timeout() {
        let wallet = wallet(1_000, 100);
        wallet.drop_transactions("airdropERC20");
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(50, 50)).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::TransferNotIncluded))
        );
        let transfer = sequencer.log().transfer.unwrap();
        assert_eq!(
            sequencer.tracker().get_status(&transfer),
            Some(TransactionStatus::TimedOut)
        );
        assert!(matches!(
            sequencer.last_error(),
            Some(Error::InclusionTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_draft_fails_before_any_read() {
        let wallet = wallet(1_000, 0);
        let sequencer = sequencer(&wallet);

        let draft = DraftInput {
            token_address: format!("{}", TOKEN),
            recipients: format!("{},{}", ALICE, BOB),
            amounts: "10".to_string(),
        };
        let outcome = sequencer.submit_draft(CHAIN_ID, OWNER, &draft).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::InvalidInput))
        );
        assert_eq!(
            sequencer.last_error(),
            Some(Error::LengthMismatch {
                recipients: 2,
                amounts: 1
            })
        );
        assert_eq!(wallet.read_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_and_resubmit() {
        let wallet = wallet(100, 0);
        let sequencer = sequencer(&wallet);

        assert!(!sequencer.reset().unwrap());

        let _ = sequencer.submit(request(100, 100)).await.unwrap();
        assert_eq!(
            sequencer.state(),
            SubmissionState::Failed(FailureReason::InsufficientBalance)
        );
        assert!(sequencer.reset().unwrap());
        assert_eq!(sequencer.state(), SubmissionState::Idle);

        let outcome = sequencer.submit(request(50, 50)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Finished(SubmissionState::Confirmed));

        // a new submission from a terminal state starts from Idle
        let outcome = sequencer.submit(request(1, 1)).await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::InsufficientBalance))
        );
        assert_eq!(
            sequencer.transitions(),
            vec![SubmissionState::Failed(FailureReason::InsufficientBalance)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_submit_fails_and_can_be_retried() {
        let wallet = wallet(1_000, 100);
        let gate = wallet.hold_inclusion();
        let sequencer = sequencer(&wallet);

        let cancelled = timeout(Duration::from_millis(50), sequencer.submit(request(50, 50))).await;
        assert!(cancelled.is_err());

        let failed = SubmissionState::Failed(FailureReason::TransferNotIncluded);
        assert_eq!(sequencer.state(), failed);
        assert!(!sequencer.is_in_flight());
        assert_eq!(
            sequencer.transitions(),
            vec![
                SubmissionState::AwaitingTransferSignature,
                SubmissionState::AwaitingTransferInclusion,
                failed,
            ]
        );
        assert!(matches!(sequencer.last_error(), Some(Error::Cancelled(_))));
        let transfer = sequencer.log().transfer.unwrap();
        assert_eq!(
            sequencer.tracker().get_status(&transfer),
            Some(TransactionStatus::Unknown)
        );
        assert!(sequencer.tracker().pending().is_empty());

        gate.notify_one();
        let outcome = sequencer.submit(request(50, 50)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Finished(SubmissionState::Confirmed));
        assert_eq!(wallet.writes().len(), 2);
        assert_eq!(wallet.balance(TOKEN, OWNER), U256::from(900u64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_prompt_counts_as_rejected() {
        let wallet = wallet(1_000, 0);
        wallet.stall("approve");
        let sequencer = sequencer(&wallet);

        let cancelled = timeout(Duration::from_millis(50), sequencer.submit(request(10, 10))).await;
        assert!(cancelled.is_err());

        assert_eq!(
            sequencer.state(),
            SubmissionState::Failed(FailureReason::ApprovalRejected)
        );
        assert_eq!(sequencer.log().approval, None);
        assert!(sequencer.reset().unwrap());
        assert_eq!(sequencer.state(), SubmissionState::Idle);
    }

    #[tokio::test]
    async fn test_lost_receipt_is_not_left_pending() {
        let wallet = wallet(1_000, 100);
        wallet.lose_receipts("airdropERC20");
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(50, 50)).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::TransferNotIncluded))
        );
        assert!(matches!(sequencer.last_error(), Some(Error::ReadFailure(_))));
        let transfer = sequencer.log().transfer.unwrap();
        assert_eq!(
            sequencer.tracker().get_status(&transfer),
            Some(TransactionStatus::Unknown)
        );
        assert!(sequencer.tracker().pending().is_empty());
        assert!(sequencer.tracker().get(&transfer).unwrap().finalized_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_approval_inclusion_timeout() {
        let wallet = wallet(1_000, 0);
        wallet.drop_transactions("approve");
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(10, 10)).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::ApprovalNotIncluded))
        );
        let approval = sequencer.log().approval.unwrap();
        assert_eq!(
            sequencer.tracker().get_status(&approval),
            Some(TransactionStatus::TimedOut)
        );
        assert!(matches!(
            sequencer.last_error(),
            Some(Error::InclusionTimeout { .. })
        ));
        // no transfer prompt after a stuck approval
        assert_eq!(wallet.writes().len(), 1);
        assert_eq!(sequencer.log().transfer, None);
    }

    #[tokio::test]
    async fn test_transfer_signing_failure() {
        let wallet = wallet(1_000, 100);
        wallet.fail_signing("airdropERC20");
        let sequencer = sequencer(&wallet);

        let outcome = sequencer.submit(request(50, 50)).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Finished(SubmissionState::Failed(FailureReason::TransferRejected))
        );
        assert!(matches!(sequencer.last_error(), Some(Error::Signing(_))));
        assert_eq!(sequencer.log().transfer, None);
        assert!(sequencer.tracker().is_empty());
    }

    #[tokio::test]
    async fn test_tracker_capacity_follows_config() {
        let wallet = wallet(1_000, 100);
        let chains = ChainRegistry::from_entries(vec![ChainEntry {
            chain_id: CHAIN_ID,
            name: "anvil".into(),
            sender: SENDER,
        }]);
        let config = SequencerConfig {
            max_tracked_transactions: 1,
            ..SequencerConfig::default()
        };
        let sequencer = TransactionSequencer::new(config, wallet.clone(), chains);

        let _ = sequencer.submit(request(50, 50)).await.unwrap();
        // the allowance is spent, so this one approves again
        let outcome = sequencer.submit(request(50, 50)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Finished(SubmissionState::Confirmed));

        let transfer = sequencer.log().transfer.unwrap();
        assert_eq!(sequencer.tracker().len(), 1);
        assert_eq!(
            sequencer.tracker().get_status(&transfer),
            Some(TransactionStatus::Confirmed)
        );
    }
}
