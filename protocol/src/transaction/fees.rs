//! # Fee Computation
//!
//! Each connected server reports the figures that scale the base
//! transaction cost:
//!
//! ```text
//! fee = ceil(fee_units × fee_base / fee_ref × load_factor / load_base × cushion)
//! ```
//!
//! With several servers connected the reports disagree. A [`LoadPolicy`]
//! picks the one figure the manager acts on, both for the fee it writes
//! into transactions and for deciding whether every server is too
//! expensive to resubmit to.

use serde::{Deserialize, Serialize};

/// One server's fee and load report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerLoad {
    pub fee_base: u64,
    pub fee_ref: u64,
    pub load_base: u64,
    pub load_factor: u64,
    #[serde(default = "connected_default")]
    pub connected: bool,
}

fn connected_default() -> bool {
    true
}

impl ServerLoad {
    /// An idle server: reference fee, no load.
    pub fn idle() -> Self {
        Self {
            fee_base: 10,
            fee_ref: 10,
            load_base: 256,
            load_factor: 256,
            connected: true,
        }
    }

    pub fn with_load_factor(mut self, load_factor: u64) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Fee in drops for `fee_units`, rounded up. `None` when a divisor
    /// is zero.
    pub fn fee(&self, fee_units: u64, cushion: f64) -> Option<u64> {
        if self.fee_ref == 0 || self.load_base == 0 {
            return None;
        }
        let fee = fee_units as f64
            * (self.fee_base as f64 / self.fee_ref as f64)
            * (self.load_factor as f64 / self.load_base as f64)
            * cushion;
        Some(fee.ceil() as u64)
    }
}

/// Which server's fee to act on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// The cheapest server.
    #[default]
    Minimum,
    /// The middle server, lower middle for an even count.
    Median,
    /// The most expensive server.
    Maximum,
}

impl LoadPolicy {
    /// Pick a fee from `fees`. `None` for an empty slice.
    pub fn select(self, fees: &[u64]) -> Option<u64> {
        let mut sorted = fees.to_vec();
        sorted.sort_unstable();
        match self {
            LoadPolicy::Minimum => sorted.first().copied(),
            LoadPolicy::Maximum => sorted.last().copied(),
            LoadPolicy::Median => match sorted.len() {
                0 => None,
                n => sorted.get((n - 1) / 2).copied(),
            },
        }
    }
}

/// Fee figures from every connected server.
pub fn connected_fees(servers: &[ServerLoad], fee_units: u64, cushion: f64) -> Vec<u64> {
    servers
        .iter()
        .filter(|s| s.connected)
        .filter_map(|s| s.fee(fee_units, cushion))
        .collect()
}
