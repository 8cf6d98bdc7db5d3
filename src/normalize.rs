//! Input normalization
//!
//! Turns the raw recipient and amount text a user types into canonical,
//! positionally paired lists and the summed total in smallest token units.

use crate::{Error, Result};
use alloy_primitives::U256;

/// Canonical form of the raw draft text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedInput {
    /// Recipient entries, in input order
    pub recipients: Vec<String>,

    /// Amount entries, in input order
    pub amounts: Vec<String>,

    /// Sum of all amounts in smallest units
    pub total: U256,
}

impl NormalizedInput {
    /// Whether both lists pair up one-to-one
    pub fn is_paired(&self) -> bool {
        self.recipients.len() == self.amounts.len()
    }

    /// Number of transfers in the batch
    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    /// Whether there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty() && self.amounts.is_empty()
    }
}

/// Split delimiter-separated text into trimmed, non-empty entries.
///
/// Any run of commas and newlines counts as one separator.
pub fn split_entries(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parse one amount entry as a base-10 integer in smallest units.
pub fn parse_amount(entry: &str) -> Result<U256> {
    if entry.is_empty() || !entry.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidAmountFormat(entry.to_string()));
    }
    U256::from_str_radix(entry, 10).map_err(|_| Error::InvalidAmountFormat(entry.to_string()))
}

/// Sum amount entries, rejecting non-numeric entries and 256-bit overflow.
pub fn calculate_total<S: AsRef<str>>(amounts: &[S]) -> Result<U256> {
    amounts.iter().try_fold(U256::ZERO, |acc, entry| {
        let amount = parse_amount(entry.as_ref())?;
        acc.checked_add(amount).ok_or(Error::AmountOverflow)
    })
}

/// Normalize raw recipient and amount text.
///
/// The two lists are not required to have equal length here; that is checked
/// when a submission is built.
pub fn normalize(raw_recipients: &str, raw_amounts: &str) -> Result<NormalizedInput> {
    let recipients = split_entries(raw_recipients);
    let amounts = split_entries(raw_amounts);
    let total = calculate_total(&amounts)?;

    Ok(NormalizedInput {
        recipients,
        amounts,
        total,
    })
}
