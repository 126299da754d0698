use std::path::Path;

use clawnet_core::error::ClawError;
use clawnet_core::types::{Address, Did};

use crate::derived::{Account, DidRecord, Escrow, MarketResource, ReputationScore};

fn storage_err(e: impl std::fmt::Display) -> ClawError {
    ClawError::Storage(e.to_string())
}

fn ser_err(e: impl std::fmt::Display) -> ClawError {
    ClawError::MalformedValue(e.to_string())
}

/// Derived state database (spec.md §3.3): accounts, escrows, DID registry,
/// reputation, and generic market/contract resources. Separate from
/// `clawnet-store::EventStore` — this is rebuildable from the log, the log
/// is not rebuildable from this (spec.md §9 "global stores ... observers
/// over the accepted-event stream").
///
/// Named trees:
///   accounts    — address utf8       → bincode(Account)
///   dids        — DID utf8           → bincode(DidRecord)
///   escrows     — escrow id utf8     → bincode(Escrow)
///   reputation  — target‖dimension   → bincode(ReputationScore)
///   resources   — resource id utf8   → bincode(MarketResource)
pub struct DerivedDb {
    _db: sled::Db,
    accounts: sled::Tree,
    dids: sled::Tree,
    escrows: sled::Tree,
    reputation: sled::Tree,
    resources: sled::Tree,
}

impl DerivedDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ClawError> {
        let db = sled::open(path).map_err(storage_err)?;
        Self::from_db(db)
    }

    pub fn temporary() -> Result<Self, ClawError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage_err)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, ClawError> {
        let accounts = db.open_tree("accounts").map_err(storage_err)?;
        let dids = db.open_tree("dids").map_err(storage_err)?;
        let escrows = db.open_tree("escrows").map_err(storage_err)?;
        let reputation = db.open_tree("reputation").map_err(storage_err)?;
        let resources = db.open_tree("resources").map_err(storage_err)?;
        Ok(Self {
            _db: db,
            accounts,
            dids,
            escrows,
            reputation,
            resources,
        })
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    pub fn get_account(&self, address: &Address) -> Result<Option<Account>, ClawError> {
        match self.accounts.get(address.0.as_str()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_account(&self, account: &Account) -> Result<(), ClawError> {
        let bytes = bincode::serialize(account).map_err(ser_err)?;
        self.accounts.insert(account.address.0.as_str(), bytes).map_err(storage_err)?;
        Ok(())
    }

    // ── DID registry ─────────────────────────────────────────────────────────

    pub fn get_did(&self, did: &Did) -> Result<Option<DidRecord>, ClawError> {
        match self.dids.get(did.as_str()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_did(&self, record: &DidRecord) -> Result<(), ClawError> {
        let bytes = bincode::serialize(record).map_err(ser_err)?;
        self.dids.insert(record.did.as_str(), bytes).map_err(storage_err)?;
        Ok(())
    }

    // ── Escrows ──────────────────────────────────────────────────────────────

    pub fn get_escrow(&self, id: &str) -> Result<Option<Escrow>, ClawError> {
        match self.escrows.get(id).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_escrow(&self, escrow: &Escrow) -> Result<(), ClawError> {
        let bytes = bincode::serialize(escrow).map_err(ser_err)?;
        self.escrows.insert(escrow.id.as_str(), bytes).map_err(storage_err)?;
        Ok(())
    }

    // ── Reputation ───────────────────────────────────────────────────────────

    fn reputation_key(target: &Did, dimension: &str) -> Vec<u8> {
        let mut k = target.as_str().as_bytes().to_vec();
        k.push(0);
        k.extend_from_slice(dimension.as_bytes());
        k
    }

    pub fn get_reputation(&self, target: &Did, dimension: &str) -> Result<Option<ReputationScore>, ClawError> {
        match self
            .reputation
            .get(Self::reputation_key(target, dimension))
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_reputation(&self, score: &ReputationScore) -> Result<(), ClawError> {
        let bytes = bincode::serialize(score).map_err(ser_err)?;
        self.reputation
            .insert(Self::reputation_key(&score.target, &score.dimension), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    // ── Market / contract resources ──────────────────────────────────────────

    pub fn get_resource(&self, id: &str) -> Result<Option<MarketResource>, ClawError> {
        match self.resources.get(id).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_resource(&self, resource: &MarketResource) -> Result<(), ClawError> {
        let bytes = bincode::serialize(resource).map_err(ser_err)?;
        self.resources.insert(resource.id.as_str(), bytes).map_err(storage_err)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), ClawError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }

    /// Wipes every derived-state tree. Used by `StateEngine::rebuild_from_log`
    /// when fork resolution retracts an already-applied event: this database
    /// is declared rebuildable from the log, so recomputing the whole
    /// projection is how its effects get undone.
    pub fn clear(&self) -> Result<(), ClawError> {
        for tree in [&self.accounts, &self.dids, &self.escrows, &self.reputation, &self.resources] {
            tree.clear().map_err(storage_err)?;
        }
        Ok(())
    }

    // ── Snapshot dump / load (spec.md §4.7) ──────────────────────────────────

    /// Raw key/value dump of every tree, for snapshot export. Values are
    /// already-bincode-encoded records; the dump doesn't re-interpret them.
    pub fn dump(&self) -> Result<Vec<(String, Vec<(Vec<u8>, Vec<u8>)>)>, ClawError> {
        let trees: [(&str, &sled::Tree); 5] = [
            ("accounts", &self.accounts),
            ("dids", &self.dids),
            ("escrows", &self.escrows),
            ("reputation", &self.reputation),
            ("resources", &self.resources),
        ];
        let mut out = Vec::with_capacity(trees.len());
        for (name, tree) in trees {
            let mut entries = Vec::new();
            for item in tree.iter() {
                let (k, v) = item.map_err(storage_err)?;
                entries.push((k.to_vec(), v.to_vec()));
            }
            out.push((name.to_string(), entries));
        }
        Ok(out)
    }

    /// Load a dump produced by `dump` into a fresh (normally empty)
    /// database — the cold-start path (spec.md §3.5).
    pub fn load(&self, dumps: &[(String, Vec<(Vec<u8>, Vec<u8>)>)]) -> Result<(), ClawError> {
        for (name, entries) in dumps {
            let tree = match name.as_str() {
                "accounts" => &self.accounts,
                "dids" => &self.dids,
                "escrows" => &self.escrows,
                "reputation" => &self.reputation,
                "resources" => &self.resources,
                _ => continue,
            };
            for (k, v) in entries {
                tree.insert(k.as_slice(), v.as_slice()).map_err(storage_err)?;
            }
        }
        Ok(())
    }
}
