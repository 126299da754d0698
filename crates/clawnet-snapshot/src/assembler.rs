use clawnet_codec::hash::sha256;
use clawnet_core::error::ClawError;
use clawnet_core::types::EventHash;

use crate::manifest::SnapshotManifest;

/// Reassembles a snapshot from chunks arriving (possibly out of order,
/// possibly from different peers) over the wire, verifying each against
/// the manifest's `chunkHashes` before accepting it (spec.md §4.7: "hash /
/// chunkIndex / chunkCount / totalBytes").
pub struct ChunkAssembler {
    manifest: SnapshotManifest,
    chunks: Vec<Option<Vec<u8>>>,
}

impl ChunkAssembler {
    pub fn new(manifest: SnapshotManifest) -> Self {
        let count = manifest.chunk_count();
        Self {
            manifest,
            chunks: vec![None; count],
        }
    }

    /// Accepts one chunk. Rejects it if the index is out of range or its
    /// hash doesn't match the manifest's declared hash for that slot.
    pub fn accept(&mut self, chunk_index: usize, bytes: Vec<u8>) -> Result<(), ClawError> {
        let expected = self
            .manifest
            .chunk_hashes
            .get(chunk_index)
            .ok_or_else(|| ClawError::MalformedValue(format!("chunk index {chunk_index} out of range")))?;
        let got = EventHash::from_bytes(sha256(&bytes));
        if got != *expected {
            return Err(ClawError::MalformedValue(format!(
                "chunk {chunk_index} hash mismatch: expected {expected}, got {got}"
            )));
        }
        self.chunks[chunk_index] = Some(bytes);
        Ok(())
    }

    pub fn manifest(&self) -> &SnapshotManifest {
        &self.manifest
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(Option::is_some)
    }

    pub fn missing(&self) -> Vec<usize> {
        self.chunks.iter().enumerate().filter(|(_, c)| c.is_none()).map(|(i, _)| i).collect()
    }

    /// Concatenates all chunks once complete and checks the result against
    /// `totalBytes`.
    pub fn finish(self) -> Result<Vec<u8>, ClawError> {
        if !self.is_complete() {
            return Err(ClawError::MalformedValue("snapshot transfer incomplete".to_string()));
        }
        let mut out = Vec::with_capacity(self.manifest.total_bytes as usize);
        for chunk in self.chunks.into_iter().flatten() {
            out.extend_from_slice(&chunk);
        }
        if out.len() as u64 != self.manifest.total_bytes {
            return Err(ClawError::MalformedValue(format!(
                "assembled snapshot size {} does not match manifest totalBytes {}",
                out.len(),
                self.manifest.total_bytes
            )));
        }
        Ok(out)
    }
}
