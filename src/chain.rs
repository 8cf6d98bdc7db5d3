//! Chain configuration
//!
//! Static mapping from chain identifier to the airdrop sender contract
//! deployed on that chain.

use crate::{Error, Result};
use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Local anvil development chain
pub const ANVIL_CHAIN_ID: u64 = 31337;

/// Sender contract address of the first deployment from anvil's default account
pub const ANVIL_SENDER: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

/// One row of the chain table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    /// EIP-155 chain identifier
    pub chain_id: u64,

    /// Human readable name
    #[serde(default)]
    pub name: String,

    /// Airdrop sender contract on this chain
    pub sender: Address,
}

/// Chain identifier to sender contract lookup
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    entries: BTreeMap<u64, ChainEntry>,
}

impl ChainRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from table rows; later rows for the same chain replace earlier ones
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ChainEntry>,
    {
        let mut registry = Self::new();
        for entry in entries {
            registry.insert(entry);
        }
        registry
    }

    /// Add or replace one chain
    pub fn insert(&mut self, entry: ChainEntry) {
        if entry.sender == Address::ZERO {
            warn!(
                "Ignoring zero-address sender contract for chain {}",
                entry.chain_id
            );
            return;
        }
        self.entries.insert(entry.chain_id, entry);
    }

    /// Sender contract for `chain_id`, if configured
    pub fn sender_for(&self, chain_id: u64) -> Option<Address> {
        self.entries.get(&chain_id).map(|entry| entry.sender)
    }

    /// Sender contract for `chain_id`, or [`Error::MissingChainConfig`]
    pub fn resolve_sender(&self, chain_id: u64) -> Result<Address> {
        self.sender_for(chain_id)
            .ok_or(Error::MissingChainConfig(chain_id))
    }

    /// Whether `chain_id` is supported
    pub fn supports(&self, chain_id: u64) -> bool {
        self.entries.contains_key(&chain_id)
    }

    /// Configured rows, ordered by chain id
    pub fn entries(&self) -> impl Iterator<Item = &ChainEntry> {
        self.entries.values()
    }
}

/// Built-in chain table
pub fn default_chains() -> Vec<ChainEntry> {
    vec![ChainEntry {
        chain_id: ANVIL_CHAIN_ID,
        name: "anvil".to_string(),
        sender: ANVIL_SENDER,
    }]
}
