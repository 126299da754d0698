use serde::{Deserialize, Serialize};

use crate::types::{Did, EventHash, Nonce, PublicKeyBytes, ResourceId, SignatureBytes, Timestamp};

/// The event envelope (spec.md §3.1). `hash` and `sig` are excluded from
/// their own preimage; `clawnet-codec::canonical` enforces that by
/// serializing `SignedPart` rather than this struct directly when computing
/// `eventHash`/`signBytes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u16,
    #[serde(rename = "type")]
    pub event_type: String,
    pub issuer: Did,
    pub ts: Timestamp,
    pub nonce: Nonce,
    pub payload: serde_json::Value,
    pub prev: Option<EventHash>,
    #[serde(rename = "pub")]
    pub pub_key: PublicKeyBytes,
    pub sig: Option<SignatureBytes>,
    pub hash: Option<EventHash>,
}

impl EventEnvelope {
    /// The subset of fields that participate in `hash`/`sig` — everything
    /// except `sig` and `hash` themselves (spec.md §4.1).
    pub fn signed_part(&self) -> SignedPart<'_> {
        SignedPart {
            v: self.v,
            event_type: &self.event_type,
            issuer: &self.issuer,
            ts: self.ts,
            nonce: self.nonce,
            payload: &self.payload,
            prev: self.prev,
            pub_key: &self.pub_key,
        }
    }

    /// `resourcePrev` lives inside the type-specific payload, not the
    /// envelope proper (spec.md §3.1 invariant). `None` means absent
    /// (legal only on create events).
    pub fn resource_prev(&self) -> Option<EventHash> {
        self.payload
            .get("resourcePrev")
            .and_then(|v| v.as_str())
            .and_then(|s| EventHash::from_hex(s).ok())
    }

    /// `resourceId`, when this event type mutates a stable resource.
    pub fn resource_id(&self) -> Option<ResourceId> {
        self.payload
            .get("resourceId")
            .and_then(|v| v.as_str())
            .map(|s| ResourceId(s.to_string()))
    }
}

/// Exactly the fields canonicalized and hashed/signed — see
/// `EventEnvelope::signed_part`.
#[derive(Debug, Clone, Serialize)]
pub struct SignedPart<'a> {
    pub v: u16,
    #[serde(rename = "type")]
    pub event_type: &'a str,
    pub issuer: &'a Did,
    pub ts: Timestamp,
    pub nonce: Nonce,
    pub payload: &'a serde_json::Value,
    pub prev: Option<EventHash>,
    #[serde(rename = "pub")]
    pub pub_key: &'a PublicKeyBytes,
}

/// A P2P transport envelope (spec.md §4.6) — distinct from the event
/// envelope it carries; signed with the peer's own key, never the issuer's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2pEnvelope {
    pub v: u16,
    pub topic: String,
    pub sender: crate::types::WirePeerId,
    pub ts: Timestamp,
    pub content_type: String,
    pub payload: Vec<u8>,
    pub sig: Option<SignatureBytes>,
}

impl P2pEnvelope {
    pub fn signed_part(&self) -> P2pSignedPart<'_> {
        P2pSignedPart {
            v: self.v,
            topic: &self.topic,
            sender: &self.sender,
            ts: self.ts,
            content_type: &self.content_type,
            payload: &self.payload,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct P2pSignedPart<'a> {
    pub v: u16,
    pub topic: &'a str,
    pub sender: &'a crate::types::WirePeerId,
    pub ts: Timestamp,
    pub content_type: &'a str,
    pub payload: &'a [u8],
}
