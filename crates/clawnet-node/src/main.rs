//! clawnet-node — the ClawNet protocol node binary.
//!
//! Startup sequence:
//!   1. Load (or default) the YAML node config
//!   2. Open the event log and derived-state stores
//!   3. Start the P2P network (libp2p GossipSub + Kademlia) on the three
//!      protocol topics
//!   4. Run the single-writer main loop: decode inbound gossip → validate →
//!      apply → re-broadcast; periodic range-request backfill and
//!      snapshot-build ticks

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use clawnet_codec::identity::pubkey_from_did;
use clawnet_codec::sign::KeyPair;
use clawnet_core::config::NodeConfig;
use clawnet_core::envelope::EventEnvelope;
use clawnet_core::error::ClawError;
use clawnet_core::types::{EventHash, PublicKeyBytes, WirePeerId};
use clawnet_finality::FinalityTracker;
use clawnet_p2p::{P2pConfig, P2pMessage, P2pNetwork, PeerEligibility};
use clawnet_snapshot::{load_snapshot, ChunkAssembler, ManifestSignature, SignatureAggregator, SnapshotManager, SnapshotManifest};
use clawnet_state::{DerivedDb, StateEngine};
use clawnet_store::EventStore;
use clawnet_validate::{Outcome, ValidationPipeline};

#[derive(Parser, Debug)]
#[command(name = "clawnet-node", version, about = "ClawNet protocol node")]
struct Args {
    /// Directory for the event log, derived state, and peer key.
    #[arg(long, default_value = "~/.clawnet/data")]
    data_dir: PathBuf,

    /// Path to a YAML node config. Missing/omitted means all defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => NodeConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => NodeConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| "info,clawnet=debug".parse().unwrap()),
        )
        .init();

    info!(network = %config.network, "clawnet node starting");

    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir).with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let events = Arc::new(EventStore::open(data_dir.join("events")).context("opening event store")?);
    let db = Arc::new(DerivedDb::open(data_dir.join("state")).context("opening derived state")?);
    let state = Arc::new(StateEngine::new(Arc::clone(&db), Arc::clone(&events)));
    let pipeline = Arc::new(ValidationPipeline::new(config.clone(), Arc::clone(&events), Arc::clone(&state)));

    let peer_key = load_or_generate_peer_key(&data_dir.join("peer.key"))?;

    let mut finality = FinalityTracker::new(config.finality.clone(), config.sybil_policy);
    let mut eligibility = PeerEligibility::new(
        config.sybil_policy,
        config.eligibility.allowlist.iter().cloned().map(WirePeerId).collect(),
        config.eligibility.pow_difficulty_bits,
        config.eligibility.min_stake,
    );
    let mut snapshot_manager = SnapshotManager::new(config.snapshot.clone());
    let mut current_snapshot: Option<(SnapshotManifest, Vec<Vec<u8>>, ManifestSignature)> = None;
    let mut inbound_snapshots: HashMap<EventHash, ChunkAssembler> = HashMap::new();
    let mut inbound_signatures: HashMap<EventHash, SignatureAggregator> = HashMap::new();
    let mut seen: HashSet<EventHash> = HashSet::new();

    let p2p_config = P2pConfig {
        listen_addrs: config.p2p.listen.clone(),
        bootstrap_peers: config.p2p.bootstrap.clone(),
        protocol_version: clawnet_core::constants::TOPIC_PREFIX.to_string(),
    };
    let (network, mut handle) = P2pNetwork::new(&p2p_config).map_err(|e| anyhow::anyhow!("building P2P network: {e}"))?;
    info!(peer_id = %handle.local_peer_id, "P2P identity");
    let outbound_tx = handle.outbound_tx.clone();
    tokio::spawn(network.run());

    let mut backfill_ticker = tokio::time::interval(std::time::Duration::from_secs(30));

    info!("node ready");
    loop {
        tokio::select! {
            Some((peer, msg)) = handle.inbound_rx.recv() => {
                handle_inbound(
                    peer,
                    msg,
                    &pipeline,
                    &events,
                    &db,
                    &outbound_tx,
                    &mut finality,
                    &mut eligibility,
                    &mut inbound_snapshots,
                    &mut inbound_signatures,
                    &mut seen,
                    &current_snapshot,
                    config.max_clock_skew_ms,
                    config.snapshot.max_bytes,
                    config.snapshot.min_signatures,
                    now_ms(),
                ).await;
            }

            _ = backfill_ticker.tick() => {
                let from = events.latest_hash().ok().flatten();
                let _ = outbound_tx.send(P2pMessage::RangeRequest { from, limit: 500 }).await;

                let now = now_ms();
                if snapshot_manager.should_snapshot(events.len() as u64, now) {
                    match snapshot_manager.build_and_sign(&db, &events, &peer_key, now) {
                        Ok((manifest, chunks, sig)) => {
                            info!(event_count = manifest.event_count, "snapshot rebuilt");
                            current_snapshot = Some((manifest, chunks, sig));
                        }
                        Err(e) => warn!(error = %e, "snapshot build failed"),
                    }
                }

                for (hash, bytes) in events.take_all_skewed().unwrap_or_default() {
                    let envelope: EventEnvelope = match serde_json::from_slice(&bytes) {
                        Ok(e) => e,
                        Err(_) => continue,
                    };
                    match pipeline.submit(envelope, &bytes, now) {
                        Ok(Outcome::Applied(_)) => info!(hash = %hash, "clock-skewed event applied on retry"),
                        Err(e) => tracing::debug!(hash = %hash, reason = e.reason(), "clock-skewed event dropped after retry"),
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_inbound(
    peer: WirePeerId,
    msg: P2pMessage,
    pipeline: &ValidationPipeline,
    events: &EventStore,
    db: &DerivedDb,
    outbound_tx: &tokio::sync::mpsc::Sender<P2pMessage>,
    finality: &mut FinalityTracker,
    eligibility: &mut PeerEligibility,
    inbound_snapshots: &mut HashMap<EventHash, ChunkAssembler>,
    inbound_signatures: &mut HashMap<EventHash, SignatureAggregator>,
    seen: &mut HashSet<EventHash>,
    current_snapshot: &Option<(SnapshotManifest, Vec<Vec<u8>>, ManifestSignature)>,
    max_clock_skew_ms: i64,
    max_snapshot_bytes: u64,
    min_snapshot_signatures: usize,
    now: i64,
) {
    match msg {
        P2pMessage::NewEvent { bytes } => {
            let envelope: EventEnvelope = match serde_json::from_slice(&bytes) {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "dropping malformed gossip event");
                    return;
                }
            };
            let retry_envelope = envelope.clone();
            match pipeline.submit(envelope, &bytes, now) {
                Ok(Outcome::Applied(hash)) => {
                    // Finality counters only tally eligible peers.
                    if eligibility.is_eligible(&peer) {
                        finality.observe(hash, peer, now, false);
                    }
                    if seen.insert(hash) {
                        let _ = outbound_tx.send(P2pMessage::NewEvent { bytes }).await;
                    }
                }
                Err(ClawError::ClockSkew { .. }) => {
                    if let Ok(hash) = clawnet_codec::hash::event_hash(&retry_envelope) {
                        if let Err(e) = events.buffer_skewed(&hash, &bytes) {
                            tracing::debug!(error = %e, "failed to buffer clock-skewed event");
                        }
                    }
                }
                Err(e) if e.is_quarantine() => tracing::debug!(reason = e.reason(), "event quarantined"),
                Err(e) => tracing::debug!(reason = e.reason(), "event rejected"),
            }
        }

        P2pMessage::RangeRequest { from, limit } => {
            if let Ok((batch, cursor)) = events.log_range(from.as_ref(), limit) {
                let wire = batch.into_iter().map(|(_, bytes)| bytes).collect();
                let _ = outbound_tx.send(P2pMessage::RangeResponse { events: wire, cursor }).await;
            }
        }

        P2pMessage::RangeResponse { events: batch, .. } => {
            for bytes in batch {
                let envelope: EventEnvelope = match serde_json::from_slice(&bytes) {
                    Ok(e) => e,
                    Err(_) => continue,
                };
                match pipeline.submit(envelope, &bytes, now) {
                    Ok(Outcome::Applied(hash)) => { finality.observe(hash, peer.clone(), now, false); }
                    Err(e) if !e.is_quarantine() => tracing::debug!(reason = e.reason(), "backfilled event rejected"),
                    _ => {}
                }
            }
        }

        P2pMessage::SnapshotRequest { from_hash } => {
            if let Some((manifest, chunks, sig)) = current_snapshot {
                if from_hash.as_ref() != Some(&manifest.last_event_hash) {
                    let manifest_bytes = bincode::serialize(manifest).unwrap_or_default();
                    for (i, chunk) in chunks.iter().enumerate() {
                        let _ = outbound_tx
                            .send(P2pMessage::SnapshotResponse {
                                hash: manifest.manifest_hash(),
                                chunk_index: i,
                                chunk_count: chunks.len(),
                                total_bytes: manifest.total_bytes,
                                manifest: manifest_bytes.clone(),
                                snapshot: chunk.clone(),
                                signatures: vec![sig.clone()],
                            })
                            .await;
                    }
                }
            }
        }

        P2pMessage::SnapshotResponse { hash, chunk_index, manifest, snapshot, signatures, .. } => {
            if !inbound_snapshots.contains_key(&hash) {
                match bincode::deserialize::<SnapshotManifest>(&manifest) {
                    Ok(m) if m.manifest_hash() == hash => {
                        if m.total_bytes > max_snapshot_bytes {
                            tracing::debug!(total_bytes = m.total_bytes, max = max_snapshot_bytes, "dropping oversized snapshot");
                            return;
                        }
                        inbound_signatures.insert(hash, SignatureAggregator::new(min_snapshot_signatures));
                        inbound_snapshots.insert(hash, ChunkAssembler::new(m));
                    }
                    _ => {
                        tracing::debug!("dropping snapshot chunk with manifest mismatch");
                        return;
                    }
                }
            }
            if let Some(aggregator) = inbound_signatures.get_mut(&hash) {
                if let Some(assembler) = inbound_snapshots.get(&hash) {
                    let manifest_for_verify = assembler.manifest().clone();
                    for sig in signatures {
                        aggregator.add(&manifest_for_verify, sig);
                    }
                }
            }
            let Some(assembler) = inbound_snapshots.get_mut(&hash) else { return };
            let signatures_ok = inbound_signatures.get(&hash).map(|a| a.satisfied()).unwrap_or(false);
            if assembler.accept(chunk_index, snapshot).is_ok() && assembler.is_complete() && signatures_ok {
                inbound_signatures.remove(&hash);
                if let Some(assembler) = inbound_snapshots.remove(&hash) {
                    let manifest = assembler.manifest().clone();
                    if let Ok(bytes) = assembler.finish() {
                        if let Err(e) = load_snapshot(db, events, &manifest, &bytes) {
                            warn!(error = %e, "failed to load cold-start snapshot");
                        }
                    }
                }
            }
        }

        P2pMessage::PowTicket(ticket) => {
            eligibility.record_pow_ticket(ticket, now, max_clock_skew_ms);
        }

        P2pMessage::StakeProof(proof) => {
            match pubkey_from_did(&proof.controller) {
                Some(bytes) => {
                    eligibility.record_stake_proof(proof, events, &PublicKeyBytes(bytes));
                }
                None => tracing::debug!("stake proof controller DID is not recoverable"),
            }
        }

        P2pMessage::PeerRotate(rotate) => {
            info!(old = %rotate.old, new = %rotate.new, "peer announced key rotation");
        }
    }
}

fn load_or_generate_peer_key(path: &Path) -> anyhow::Result<KeyPair> {
    if let Ok(bytes) = std::fs::read(path) {
        let secret: [u8; 32] = bytes.as_slice().try_into().map_err(|_| anyhow::anyhow!("corrupt peer key at {}", path.display()))?;
        return Ok(KeyPair::from_secret_bytes(&secret));
    }
    warn!(path = %path.display(), "no peer key found, generating one");
    let key_pair = KeyPair::generate();
    std::fs::write(path, key_pair.secret_bytes())?;
    Ok(key_pair)
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
