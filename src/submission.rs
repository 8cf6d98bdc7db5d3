//! Airdrop submission snapshot
//!
//! Builds the immutable request the sequencer works from and rejects anything
//! that cannot be submitted before a wallet prompt is ever issued.

use crate::draft::DraftInput;
use crate::normalize::{normalize, parse_amount, NormalizedInput};
use crate::{Error, Result};
use alloy_primitives::{Address, U256};
use std::str::FromStr;
use tracing::debug;

/// Everything one submission needs, captured at submit time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirdropRequest {
    /// Active chain
    pub chain_id: u64,

    /// Connected account
    pub owner: Address,

    /// Token being distributed
    pub token: Address,

    /// Recipients, positionally paired with `amounts`
    pub recipients: Vec<Address>,

    /// Amounts in smallest units
    pub amounts: Vec<U256>,

    /// Sum of `amounts`
    pub total: U256,
}

fn parse_address(entry: &str) -> Result<Address> {
    Address::from_str(entry.trim()).map_err(|_| Error::InvalidAddress(entry.to_string()))
}

impl AirdropRequest {
    /// Build a request from already normalized input.
    ///
    /// Validation order:
    /// 1. Token address parses
    /// 2. Recipient and amount counts match
    /// 3. Batch is not empty
    /// 4. Every recipient parses as an address
    /// 5. Every amount parses
    pub fn from_normalized(
        chain_id: u64,
        owner: Address,
        token: &str,
        input: &NormalizedInput,
    ) -> Result<Self> {
        let token = parse_address(token)?;

        if !input.is_paired() {
            return Err(Error::LengthMismatch {
                recipients: input.recipients.len(),
                amounts: input.amounts.len(),
            });
        }

        if input.recipients.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let recipients = input
            .recipients
            .iter()
            .map(|entry| parse_address(entry))
            .collect::<Result<Vec<_>>>()?;

        let amounts = input
            .amounts
            .iter()
            .map(|entry| parse_amount(entry))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Built airdrop request: {} recipients, total {}",
            recipients.len(),
            input.total
        );

        Ok(Self {
            chain_id,
            owner,
            token,
            recipients,
            amounts,
            total: input.total,
        })
    }

    /// Normalize a draft and build a request from it
    pub fn from_draft(chain_id: u64, owner: Address, draft: &DraftInput) -> Result<Self> {
        let input = normalize(&draft.recipients, &draft.amounts)?;
        Self::from_normalized(chain_id, owner, &draft.token_address, &input)
    }

    /// Number of transfers
    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}
