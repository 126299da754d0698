use std::collections::{HashMap, HashSet};

use clawnet_codec::sign::verify;
use clawnet_core::config::SybilPolicy;
use clawnet_core::types::{PublicKeyBytes, Timestamp, WirePeerId};
use clawnet_store::EventStore;

use crate::message::{PowTicket, StakeProof};

fn leading_zero_bits(bytes: &[u8; 32]) -> u32 {
    let mut n = 0;
    for byte in bytes {
        if *byte == 0 {
            n += 8;
            continue;
        }
        n += byte.leading_zeros();
        break;
    }
    n
}

/// Tracks which peers are currently eligible under the locally configured
/// sybil policy (spec.md §4.6). Eligibility gates both gossip re-broadcast
/// trust and peer-count finality tallying.
pub struct PeerEligibility {
    policy: SybilPolicy,
    allowlist: HashSet<WirePeerId>,
    pow_difficulty_bits: u32,
    stake_min: u128,
    pow_seen: HashMap<WirePeerId, PowTicket>,
    stake_seen: HashMap<WirePeerId, StakeProof>,
}

impl PeerEligibility {
    pub fn new(policy: SybilPolicy, allowlist: Vec<WirePeerId>, pow_difficulty_bits: u32, stake_min: u128) -> Self {
        Self {
            policy,
            allowlist: allowlist.into_iter().collect(),
            pow_difficulty_bits,
            stake_min,
            pow_seen: HashMap::new(),
            stake_seen: HashMap::new(),
        }
    }

    pub fn is_eligible(&self, peer: &WirePeerId) -> bool {
        match self.policy {
            SybilPolicy::None => true,
            SybilPolicy::Allowlist => self.allowlist.contains(peer),
            SybilPolicy::Pow => self.pow_seen.contains_key(peer),
            SybilPolicy::Stake => self.stake_seen.contains_key(peer),
        }
    }

    /// Verifies `ticket`'s signature, timestamp, and proof-of-work difficulty,
    /// then records the peer as eligible if it passes. Returns whether it
    /// was accepted.
    pub fn record_pow_ticket(&mut self, ticket: PowTicket, now: Timestamp, max_clock_skew_ms: i64) -> bool {
        if (now - ticket.ts).abs() > max_clock_skew_ms {
            return false;
        }
        if leading_zero_bits(ticket.hash.as_bytes()) < ticket.difficulty.max(self.pow_difficulty_bits) {
            return false;
        }
        let signer = PublicKeyBytes(ticket.peer.0.as_bytes().to_vec());
        if verify(&signer, &ticket.signing_bytes(), &ticket.sig).is_err() {
            return false;
        }
        self.pow_seen.insert(ticket.peer.clone(), ticket);
        true
    }

    /// Verifies `proof` references a `wallet.stake` event actually present
    /// in the local log and meets the configured minimum, then records the
    /// peer as eligible. Returns whether it was accepted.
    pub fn record_stake_proof(&mut self, proof: StakeProof, events: &EventStore, controller_key: &PublicKeyBytes) -> bool {
        if proof.min_stake < self.stake_min {
            return false;
        }
        if !events.contains(&proof.stake_event) {
            return false;
        }
        let peer_key = PublicKeyBytes(proof.peer.0.as_bytes().to_vec());
        if verify(&peer_key, &proof.signing_bytes(), &proof.sig).is_err() {
            return false;
        }
        if verify(controller_key, &proof.signing_bytes(), &proof.sig_controller).is_err() {
            return false;
        }
        self.stake_seen.insert(proof.peer.clone(), proof);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_policy_admits_every_peer() {
        let elig = PeerEligibility::new(SybilPolicy::None, vec![], 0, 0);
        assert!(elig.is_eligible(&WirePeerId("anyone".to_string())));
    }

    #[test]
    fn allowlist_rejects_unlisted_peers() {
        let listed = WirePeerId("listed".to_string());
        let elig = PeerEligibility::new(SybilPolicy::Allowlist, vec![listed.clone()], 0, 0);
        assert!(elig.is_eligible(&listed));
        assert!(!elig.is_eligible(&WirePeerId("unlisted".to_string())));
    }

    #[test]
    fn pow_ticket_below_difficulty_is_rejected() {
        let mut elig = PeerEligibility::new(SybilPolicy::Pow, vec![], 16, 0);
        let peer = WirePeerId("peer".to_string());
        let ticket = PowTicket {
            peer: peer.clone(),
            ts: 0,
            nonce: 0,
            difficulty: 0,
            hash: clawnet_core::types::EventHash::from_bytes([0xff; 32]),
            sig: clawnet_core::types::SignatureBytes(vec![0u8; 64]),
        };
        assert!(!elig.record_pow_ticket(ticket, 0, 1_000));
        assert!(!elig.is_eligible(&peer));
    }
}
