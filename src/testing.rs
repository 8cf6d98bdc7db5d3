//! In-memory wallet for tests and local integration
//!
//! `ScriptedWallet` keeps token state in memory, applies approvals and
//! airdrops when their transactions are included, and records every write so
//! callers can assert which prompts were issued.

use crate::client::{CallValue, ContractCall, PendingTransaction, TransactionReceipt, WalletClient};
use crate::{Error, Result};
use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// One write the wallet was asked to sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub from: Address,
    pub to: Address,
    pub call: ContractCall,
    pub hash: TxHash,
}

#[derive(Default)]
struct Inner {
    tokens: HashMap<Address, (String, u8)>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    writes: Vec<WriteRecord>,
    read_count: usize,
    read_failure: Option<String>,
    rejected: HashSet<&'static str>,
    stalled: HashSet<&'static str>,
    reverted: HashSet<&'static str>,
    dropped: HashSet<&'static str>,
    signing_failures: HashSet<&'static str>,
    lost_receipts: HashSet<&'static str>,
    inclusion_gate: Option<Arc<Notify>>,
    block_number: u64,
}

/// Scripted [`WalletClient`] backed by in-memory token state
#[derive(Default)]
pub struct ScriptedWallet {
    inner: Mutex<Inner>,
}

impl ScriptedWallet {
    /// Empty wallet with no tokens
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a token with its metadata
    pub fn with_token(self, token: Address, name: &str, decimals: u8) -> Self {
        self.inner().tokens.insert(token, (name.to_string(), decimals));
        self
    }

    /// Set `owner`'s balance of `token`
    pub fn with_balance(self, token: Address, owner: Address, balance: U256) -> Self {
        self.set_balance(token, owner, balance);
        self
    }

    /// Set the allowance `owner` granted `spender` over `token`
    pub fn with_allowance(
        self,
        token: Address,
        owner: Address,
        spender: Address,
        allowance: U256,
    ) -> Self {
        self.set_allowance(token, owner, spender, allowance);
        self
    }

    pub fn set_balance(&self, token: Address, owner: Address, balance: U256) {
        self.inner().balances.insert((token, owner), balance);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, allowance: U256) {
        self.inner()
            .allowances
            .insert((token, owner, spender), allowance);
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        self.inner()
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.inner()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    /// Make every read fail with `message`
    pub fn fail_reads(&self, message: &str) {
        self.inner().read_failure = Some(message.to_string());
    }

    /// Decline the wallet prompt for `method`
    pub fn reject(&self, method: &'static str) {
        self.inner().rejected.insert(method);
    }

    /// Leave the wallet prompt for `method` unanswered
    pub fn stall(&self, method: &'static str) {
        self.inner().stalled.insert(method);
    }

    /// Include transactions calling `method` as reverted
    pub fn revert(&self, method: &'static str) {
        self.inner().reverted.insert(method);
    }

    /// Never include transactions calling `method`
    pub fn drop_transactions(&self, method: &'static str) {
        self.inner().dropped.insert(method);
    }

    /// Fail to sign `method` (a wallet error, not a user decision)
    pub fn fail_signing(&self, method: &'static str) {
        self.inner().signing_failures.insert(method);
    }

    /// Broadcast `method` but fail every wait for its receipt
    pub fn lose_receipts(&self, method: &'static str) {
        self.inner().lost_receipts.insert(method);
    }

    /// Hold every inclusion until the returned handle is notified once per transaction
    pub fn hold_inclusion(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner().inclusion_gate = Some(gate.clone());
        gate
    }

    /// Every write requested so far, in order
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.inner().writes.clone()
    }

    /// Number of reads served
    pub fn read_count(&self) -> usize {
        self.inner().read_count
    }

    fn token_meta(inner: &Inner, token: Address) -> Result<(String, u8)> {
        inner
            .tokens
            .get(&token)
            .cloned()
            .ok_or_else(|| Error::ReadFailure(format!("no contract at {}", token)))
    }

    fn apply(inner: &mut Inner, record: &WriteRecord) -> bool {
        match &record.call {
            ContractCall::Approve { spender, amount } => {
                inner
                    .allowances
                    .insert((record.to, record.from, *spender), *amount);
                true
            }
            ContractCall::AirdropErc20 {
                token,
                recipients,
                amounts,
                total,
            } => {
                let owner = record.from;
                let spender = record.to;
                let allowance = inner
                    .allowances
                    .get(&(*token, owner, spender))
                    .copied()
                    .unwrap_or_default();
                let balance = inner
                    .balances
                    .get(&(*token, owner))
                    .copied()
                    .unwrap_or_default();
                let sum = amounts
                    .iter()
                    .try_fold(U256::ZERO, |acc, amount| acc.checked_add(*amount));

                if recipients.len() != amounts.len()
                    || sum != Some(*total)
                    || allowance < *total
                    || balance < *total
                {
                    return false;
                }

                inner
                    .allowances
                    .insert((*token, owner, spender), allowance - *total);
                inner.balances.insert((*token, owner), balance - *total);
                for (recipient, amount) in recipients.iter().zip(amounts) {
                    let entry = inner.balances.entry((*token, *recipient)).or_default();
                    *entry += *amount;
                }
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl WalletClient for ScriptedWallet {
    async fn read(&self, contract: Address, call: ContractCall) -> Result<CallValue> {
        let mut inner = self.inner();
        inner.read_count += 1;
        if let Some(message) = &inner.read_failure {
            return Err(Error::ReadFailure(message.clone()));
        }

        let (name, decimals) = Self::token_meta(&inner, contract)?;
        let value = match call {
            ContractCall::Decimals => CallValue::Uint(U256::from(decimals)),
            ContractCall::Name => CallValue::Text(name),
            ContractCall::BalanceOf { owner } => CallValue::Uint(
                inner
                    .balances
                    .get(&(contract, owner))
                    .copied()
                    .unwrap_or_default(),
            ),
            ContractCall::Allowance { owner, spender } => CallValue::Uint(
                inner
                    .allowances
                    .get(&(contract, owner, spender))
                    .copied()
                    .unwrap_or_default(),
            ),
            other => {
                return Err(Error::ReadFailure(format!(
                    "{} is not a read-only call",
                    other
                )))
            }
        };
        Ok(value)
    }

    async fn write(
        &self,
        from: Address,
        contract: Address,
        call: ContractCall,
    ) -> Result<PendingTransaction> {
        let method = call.method();
        {
            let mut inner = self.inner();
            let hash = TxHash::left_padding_from(&(inner.writes.len() as u64 + 1).to_be_bytes());
            inner.writes.push(WriteRecord {
                from,
                to: contract,
                call,
                hash,
            });
            if inner.rejected.contains(method) {
                return Err(Error::SignatureRejected(format!(
                    "user denied {} request",
                    method
                )));
            }
            if inner.signing_failures.contains(method) {
                return Err(Error::Signing(format!("wallet could not sign {}", method)));
            }
            if !inner.stalled.contains(method) {
                return Ok(PendingTransaction {
                    hash,
                    from,
                    to: contract,
                    method,
                });
            }
        }

        std::future::pending::<Result<PendingTransaction>>().await
    }

    async fn wait_for_inclusion(
        &self,
        tx: &PendingTransaction,
        _confirmations: u64,
    ) -> Result<TransactionReceipt> {
        let (gate, dropped) = {
            let inner = self.inner();
            if inner.lost_receipts.contains(tx.method) {
                return Err(Error::ReadFailure(format!(
                    "connection lost waiting for {}",
                    tx.hash
                )));
            }
            (inner.inclusion_gate.clone(), inner.dropped.contains(tx.method))
        };
        if dropped {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut inner = self.inner();
        let record = inner
            .writes
            .iter()
            .find(|record| record.hash == tx.hash)
            .cloned()
            .ok_or_else(|| Error::Internal(format!("unknown transaction {}", tx.hash)))?;

        inner.block_number += 1;
        let block_number = inner.block_number;
        let success = !inner.reverted.contains(tx.method) && Self::apply(&mut inner, &record);
        if !success {
            return Err(Error::InclusionReverted(tx.hash.to_string()));
        }

        Ok(TransactionReceipt {
            hash: tx.hash,
            block_number,
            success,
        })
    }
}
