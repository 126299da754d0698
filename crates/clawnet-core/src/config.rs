use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{
    DEFAULT_FINALITY_TIERS, DEFAULT_FINALITY_TIME_MS, DEFAULT_MAX_SNAPSHOT_CHUNK_BYTES,
    DEFAULT_MAX_SNAPSHOT_TOTAL_BYTES, DEFAULT_MIN_SNAPSHOT_SIGNATURES,
    DEFAULT_SNAPSHOT_MIN_EVENTS, DEFAULT_SNAPSHOT_MIN_INTERVAL_MS, MAX_CLOCK_SKEW_MS,
    MAX_EVENT_BYTES, NONCE_WINDOW,
};
use crate::error::ClawError;

/// Sybil-gating policy (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SybilPolicy {
    None,
    Allowlist,
    Pow,
    Stake,
}

impl Default for SybilPolicy {
    fn default() -> Self {
        SybilPolicy::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalityConfig {
    /// Amount-ceiling -> required distinct eligible peers, ascending.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<(u128, u32)>,
    #[serde(default = "default_finality_time_ms")]
    pub time_ms: i64,
}

fn default_tiers() -> Vec<(u128, u32)> {
    DEFAULT_FINALITY_TIERS.to_vec()
}

fn default_finality_time_ms() -> i64 {
    DEFAULT_FINALITY_TIME_MS
}

impl Default for FinalityConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            time_ms: default_finality_time_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_min_events")]
    pub min_events: u64,
    #[serde(default = "default_snapshot_min_interval_ms")]
    pub min_interval_ms: i64,
    #[serde(default = "default_min_signatures")]
    pub min_signatures: usize,
    #[serde(default = "default_max_total_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
}

fn default_snapshot_min_events() -> u64 {
    DEFAULT_SNAPSHOT_MIN_EVENTS
}
fn default_snapshot_min_interval_ms() -> i64 {
    DEFAULT_SNAPSHOT_MIN_INTERVAL_MS
}
fn default_min_signatures() -> usize {
    DEFAULT_MIN_SNAPSHOT_SIGNATURES
}
fn default_max_total_bytes() -> u64 {
    DEFAULT_MAX_SNAPSHOT_TOTAL_BYTES
}
fn default_max_chunk_bytes() -> usize {
    DEFAULT_MAX_SNAPSHOT_CHUNK_BYTES
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            min_events: default_snapshot_min_events(),
            min_interval_ms: default_snapshot_min_interval_ms(),
            min_signatures: default_min_signatures(),
            max_bytes: default_max_total_bytes(),
            max_chunk_bytes: default_max_chunk_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2pConfigKeys {
    #[serde(default = "default_listen")]
    pub listen: Vec<String>,
    #[serde(default)]
    pub bootstrap: Vec<String>,
}

fn default_listen() -> Vec<String> {
    vec!["/ip4/0.0.0.0/tcp/7780".to_string()]
}

impl Default for P2pConfigKeys {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            bootstrap: Vec::new(),
        }
    }
}

/// Sybil-policy parameters (spec.md §4.6). Only the fields relevant to the
/// active `sybil_policy` are consulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityConfig {
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default = "default_pow_difficulty_bits")]
    pub pow_difficulty_bits: u32,
    #[serde(default)]
    pub min_stake: u128,
}

fn default_pow_difficulty_bits() -> u32 {
    16
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            allowlist: Vec::new(),
            pow_difficulty_bits: default_pow_difficulty_bits(),
            min_stake: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Full node configuration (spec.md §6 "Configuration keys"), loaded from a
/// YAML file on disk. Every field defaults so an empty/missing file still
/// boots a usable devnet node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub p2p: P2pConfigKeys,
    #[serde(default)]
    pub sybil_policy: SybilPolicy,
    #[serde(default)]
    pub eligibility: EligibilityConfig,
    #[serde(default)]
    pub finality: FinalityConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default = "default_nonce_window")]
    pub nonce_window: u64,
    #[serde(default = "default_clock_skew")]
    pub max_clock_skew_ms: i64,
    #[serde(default = "default_max_event_bytes")]
    pub max_event_bytes: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_network() -> String {
    "devnet".to_string()
}
fn default_nonce_window() -> u64 {
    NONCE_WINDOW
}
fn default_clock_skew() -> i64 {
    MAX_CLOCK_SKEW_MS
}
fn default_max_event_bytes() -> usize {
    MAX_EVENT_BYTES
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            p2p: P2pConfigKeys::default(),
            sybil_policy: SybilPolicy::default(),
            eligibility: EligibilityConfig::default(),
            finality: FinalityConfig::default(),
            snapshot: SnapshotConfig::default(),
            nonce_window: default_nonce_window(),
            max_clock_skew_ms: default_clock_skew(),
            max_event_bytes: default_max_event_bytes(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from a YAML file, falling back to defaults for any field the
    /// file omits. A missing file is not an error — callers that want to
    /// require one should check existence first.
    pub fn load(path: &Path) -> Result<Self, ClawError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClawError::Other(format!("reading config {}: {e}", path.display())))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| ClawError::MalformedValue(format!("config {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_yaml() {
        let cfg = NodeConfig::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: NodeConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.network, cfg.network);
        assert_eq!(back.nonce_window, NONCE_WINDOW);
    }

    #[test]
    fn empty_document_uses_all_defaults() {
        let cfg: NodeConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.sybil_policy, SybilPolicy::None);
        assert_eq!(cfg.snapshot.min_events, DEFAULT_SNAPSHOT_MIN_EVENTS);
    }
}
