//! Checkpoints and startup reconciliation
//!
//! A checkpoint is a full [`Snapshot`] of the tree, sealed like any other
//! object and named `meta.<version>.<tag>`, where `version` is the last log
//! folded into it.
//!
//! # Reconciliation
//!
//! At mount time [`CheckpointEngine::recover`] merges what is in the local
//! staging directory with what is in the remote `meta/` directory:
//!
//! 1. pick the highest-versioned checkpoint (local wins a tie) as the baseline
//! 2. replay every later log in version order, requiring contiguous versions
//! 3. tolerate a damaged tail only in the final `current` log
//! 4. if anything was replayed, write a new checkpoint and delete everything
//!    it supersedes, locally and remotely
//!
//! Checkpoints are written to `meta.<version>.tmp` first, renamed once the
//! tag is known, then uploaded.

mod snapshot;
mod staging;

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use object_store::{ObjectStore, StoreError};

use crate::config::Layout;
use crate::crypto::{CryptoError, CryptoManager};
use crate::oplog::{self, MetaKind, MetaName, OpLogError, ParsedLog};
use crate::tree::{Tree, TreeError};

pub use snapshot::{Snapshot, SnapshotNode};
pub use staging::Staging;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("malformed metadata: {0}")]
    Format(String),
    #[error("replay of {name} failed: {source}")]
    Replay {
        name: String,
        #[source]
        source: TreeError,
    },
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("log error: {0}")]
    OpLog(#[from] OpLogError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Location {
    Local,
    Remote,
}

/// A log or checkpoint found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: MetaName,
    pub location: Location,
}

/// Outcome of [`CheckpointEngine::recover`].
#[derive(Debug)]
pub struct Recovered {
    pub tree: Tree,
    /// Version of the last log reflected in `tree`
    pub version: u64,
    pub checkpoint: Option<MetaName>,
    /// Number of logs replayed on top of the checkpoint
    pub replayed: usize,
}

#[derive(Debug, Clone)]
pub struct CheckpointEngine {
    crypto: CryptoManager,
    remote: Arc<dyn ObjectStore>,
    layout: Layout,
    staging: Staging,
}

impl CheckpointEngine {
    pub fn new(
        crypto: CryptoManager,
        remote: Arc<dyn ObjectStore>,
        layout: Layout,
        staging: Staging,
    ) -> Self {
        Self {
            crypto,
            remote,
            layout,
            staging,
        }
    }

    pub fn staging(&self) -> &Staging {
        &self.staging
    }

    /// Every parseable log and checkpoint name, local ones first.
    pub fn candidates(&self) -> Result<Vec<Candidate>, CheckpointError> {
        let mut out = Vec::new();
        for name in self.staging.names()? {
            if let Some(name) = parse_candidate(&name, Location::Local) {
                out.push(Candidate {
                    name,
                    location: Location::Local,
                });
            }
        }

        let remote = match self.remote.list(&self.layout.meta) {
            Ok(items) => items,
            Err(err) if err.is_not_found() => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        for item in remote.into_iter().filter(|item| item.is_file) {
            if let Some(name) = parse_candidate(&item.name, Location::Remote) {
                out.push(Candidate {
                    name,
                    location: Location::Remote,
                });
            }
        }
        Ok(out)
    }

    /// Rebuild the tree from the best checkpoint plus every later log.
    pub fn recover(&self) -> Result<Recovered, CheckpointError> {
        let candidates = self.candidates()?;

        let mut checkpoints: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.name.kind == MetaKind::Checkpoint)
            .collect();
        checkpoints.sort_by(|a, b| {
            b.name
                .version
                .cmp(&a.name.version)
                .then(a.location.cmp(&b.location))
        });

        let (tree, mut version, baseline) = match checkpoints.first() {
            Some(candidate) => {
                let tree = self.load_checkpoint(candidate)?;
                tracing::info!(
                    "loaded checkpoint {} from {:?}",
                    candidate.name,
                    candidate.location
                );
                (tree, candidate.name.version, Some(*candidate))
            }
            None => (Tree::new(), 0, None),
        };

        let mut logs: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.name.kind == MetaKind::Log && c.name.version > version)
            .collect();
        logs.sort_by(|a, b| {
            a.name
                .replay_order(&b.name)
                .then(a.location.cmp(&b.location))
        });
        // keep the preferred copy of each version
        logs.dedup_by(|later, earlier| later.name.version == earlier.name.version);

        let mut replayed = 0;
        for (index, log) in logs.iter().enumerate() {
            let next = version + 1;
            if log.name.version != next {
                return Err(CheckpointError::Format(format!(
                    "log version {} is missing, found {}",
                    next, log.name.version
                )));
            }
            let tolerant = log.name.is_current() && index + 1 == logs.len();
            let applied = self.replay_log(&tree, log, tolerant)?;
            if applied == 0 && log.name.is_current() {
                // nothing happened before the crash; the version gets reused
                tracing::debug!("skipping empty log {}", log.name);
                continue;
            }
            version = log.name.version;
            replayed += 1;
        }

        let checkpoint = if replayed > 0 {
            let name = self.write_checkpoint(&Snapshot::capture(&tree), version)?;
            for candidate in &candidates {
                self.remove(candidate);
            }
            Some(name)
        } else {
            if let Some(candidate) = baseline {
                self.ensure_published(candidate, &candidates)?;
            }
            baseline.map(|c| c.name)
        };

        tracing::info!(
            "recovered tree at version {} ({} logs replayed)",
            version,
            replayed
        );
        Ok(Recovered {
            tree,
            version,
            checkpoint,
            replayed,
        })
    }

    /// Seal `snapshot` as the checkpoint for `version`, keep a local copy and
    ///  upload it.
    pub fn write_checkpoint(
        &self,
        snapshot: &Snapshot,
        version: u64,
    ) -> Result<MetaName, CheckpointError> {
        let plaintext = snapshot.encode()?;
        let (sealed, tag) = self.crypto.seal(&plaintext)?;

        let tmp = self.staging.path(&MetaName::temp_checkpoint(version));
        let mut file = File::create(&tmp)?;
        file.write_all(&sealed)?;
        file.sync_all()?;
        drop(file);

        let name = MetaName::checkpoint(version, tag);
        std::fs::rename(&tmp, self.staging.path(&name.to_string()))?;
        self.remote.write_all(&self.layout.meta_file(&name), &sealed)?;

        tracing::info!("wrote checkpoint {} ({} bytes)", name, sealed.len());
        Ok(name)
    }

    /// Upload a sealed local log.
    pub fn publish_log(&self, name: &MetaName, path: &Path) -> Result<(), CheckpointError> {
        let bytes = std::fs::read(path)?;
        self.remote.write_all(&self.layout.meta_file(name), &bytes)?;
        tracing::debug!("published log {}", name);
        Ok(())
    }

    /// Delete every log and checkpoint at or below `version` except `keep`.
    ///
    /// Failures are logged and skipped; leftovers are picked up next time.
    pub fn cleanup(&self, version: u64, keep: &MetaName) -> Result<usize, CheckpointError> {
        let mut removed = 0;
        for candidate in self.candidates()? {
            if candidate.name.version <= version
                && candidate.name != *keep
                && self.remove(&candidate)
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn load_checkpoint(&self, candidate: &Candidate) -> Result<Tree, CheckpointError> {
        let sealed = self.read(candidate)?;
        let plaintext = self.crypto.open(&sealed, candidate.name.expected_tag())?;
        Snapshot::decode(&plaintext)?.restore()
    }

    /// Replay one log into `tree`, returning the number of records applied.
    fn replay_log(
        &self,
        tree: &Tree,
        log: &Candidate,
        tolerant: bool,
    ) -> Result<usize, CheckpointError> {
        let sealed = self.read(log)?;
        let ParsedLog { records, error } = oplog::read_log(&self.crypto, &log.name, &sealed);

        if let Some(err) = error {
            if !tolerant {
                return Err(err.into());
            }
            tracing::warn!(
                "log {} is damaged after {} records, keeping the prefix: {}",
                log.name,
                records.len(),
                err
            );
        }

        let mut applied = 0;
        for record in &records {
            match tree.apply(record) {
                Ok(_) => applied += 1,
                Err(err) if tolerant => {
                    tracing::warn!("stopping replay of {} at {:?}: {}", log.name, record, err);
                    break;
                }
                Err(source) => {
                    return Err(CheckpointError::Replay {
                        name: log.name.to_string(),
                        source,
                    })
                }
            }
        }
        tracing::debug!("replayed {} records from {}", applied, log.name);
        Ok(applied)
    }

    fn read(&self, candidate: &Candidate) -> Result<Vec<u8>, CheckpointError> {
        let name = candidate.name.to_string();
        match candidate.location {
            Location::Local => self.staging.read(&name),
            Location::Remote => Ok(self.remote.read_all(&self.layout.meta_path(&name))?),
        }
    }

    fn remove(&self, candidate: &Candidate) -> bool {
        let name = candidate.name.to_string();
        let result = match candidate.location {
            Location::Local => self.staging.delete(&name),
            Location::Remote => self
                .remote
                .delete(&self.layout.meta_path(&name))
                .map_err(CheckpointError::from),
        };
        match result {
            Ok(()) => {
                tracing::debug!("removed stale {} ({:?})", name, candidate.location);
                true
            }
            Err(err) => {
                tracing::warn!("failed to remove stale {} ({:?}): {}", name, candidate.location, err);
                false
            }
        }
    }

    // a checkpoint that only exists locally was never uploaded
    fn ensure_published(
        &self,
        candidate: &Candidate,
        candidates: &[Candidate],
    ) -> Result<(), CheckpointError> {
        let on_remote = candidates
            .iter()
            .any(|c| c.location == Location::Remote && c.name == candidate.name);
        if candidate.location == Location::Local && !on_remote {
            let sealed = self.staging.read(&candidate.name.to_string())?;
            self.remote
                .write_all(&self.layout.meta_file(&candidate.name), &sealed)?;
            tracing::info!("uploaded local checkpoint {}", candidate.name);
        }
        Ok(())
    }
}

fn parse_candidate(name: &str, location: Location) -> Option<MetaName> {
    match name.parse::<MetaName>() {
        Ok(name) => Some(name),
        Err(_) => {
            tracing::warn!("ignoring unrecognized meta file {} ({:?})", name, location);
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::MasterKey;
    use crate::oplog::{LogWriter, OpRecord};
    use crate::ticks;
    use object_store::MemoryStore;
    use tempfile::TempDir;

    struct Env {
        engine: CheckpointEngine,
        crypto: CryptoManager,
        remote: Arc<MemoryStore>,
        layout: Layout,
        _temp: TempDir,
    }

    fn env() -> Env {
        let temp = TempDir::new().unwrap();
        let crypto = CryptoManager::new(MasterKey::generate().unwrap());
        let remote = Arc::new(MemoryStore::new());
        let layout = Layout::new("/fs");
        remote.create_directory(&layout.meta).unwrap();
        let staging = Staging::open(temp.path().join("staging")).unwrap();
        let engine = CheckpointEngine::new(crypto.clone(), remote.clone(), layout.clone(), staging);
        Env {
            engine,
            crypto,
            remote,
            layout,
            _temp: temp,
        }
    }

    fn records() -> Vec<OpRecord> {
        let t = ticks::now();
        (0..9)
            .map(|i| OpRecord::create_directory(format!("/d{i}"), t))
            .collect()
    }

    // write `records` as one log at `version`, sealing and publishing it unless `open`
    fn write_log(env: &Env, version: u64, records: &[OpRecord], open: bool) -> Option<MetaName> {
        let mut log = LogWriter::create(env.engine.staging().dir(), version, &env.crypto).unwrap();
        for record in records {
            log.append(record).unwrap();
        }
        if open {
            return None;
        }
        let (name, path) = log.seal().unwrap().unwrap();
        env.engine.publish_log(&name, &path).unwrap();
        Some(name)
    }

    fn full_replay(records: &[OpRecord]) -> Snapshot {
        let tree = Tree::new();
        for record in records {
            tree.apply(record).unwrap();
        }
        Snapshot::capture(&tree)
    }

    #[test]
    fn test_empty_start() {
        let env = env();
        let recovered = env.engine.recover().unwrap();
        assert_eq!(recovered.version, 0);
        assert_eq!(recovered.replayed, 0);
        assert!(recovered.checkpoint.is_none());
        assert!(recovered.tree.root().is_empty());
    }

    #[test]
    fn test_replay_logs_then_checkpoint() {
        let env = env();
        let records = records();
        write_log(&env, 1, &records[..3], false);
        write_log(&env, 2, &records[3..6], false);
        write_log(&env, 3, &records[6..], true);

        let recovered = env.engine.recover().unwrap();
        assert_eq!(recovered.version, 3);
        assert_eq!(recovered.replayed, 3);
        assert_eq!(Snapshot::capture(&recovered.tree), full_replay(&records));

        // only the new checkpoint survives, locally and remotely
        let checkpoint = recovered.checkpoint.unwrap();
        assert_eq!(checkpoint.version, 3);
        assert_eq!(env.engine.staging().names().unwrap(), vec![checkpoint.to_string()]);
        let remote: Vec<_> = env
            .remote
            .list(&env.layout.meta)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(remote, vec![checkpoint.to_string()]);

        // and it reproduces the same tree on its own
        let again = env.engine.recover().unwrap();
        assert_eq!(again.replayed, 0);
        assert_eq!(again.checkpoint, Some(checkpoint));
        assert_eq!(Snapshot::capture(&again.tree), full_replay(&records));
    }

    #[test]
    fn test_checkpoint_equivalence() {
        let records = records();
        for split in 1..=2u64 {
            let env = env();
            let logs = [&records[..3], &records[3..6], &records[6..]];
            let tree = Tree::new();
            for (i, chunk) in logs.iter().enumerate() {
                write_log(&env, i as u64 + 1, chunk, false);
                if i as u64 + 1 <= split {
                    for record in chunk.iter() {
                        tree.apply(record).unwrap();
                    }
                }
            }
            let name = env
                .engine
                .write_checkpoint(&Snapshot::capture(&tree), split)
                .unwrap();
            env.engine.cleanup(split, &name).unwrap();

            let recovered = env.engine.recover().unwrap();
            assert_eq!(recovered.replayed as u64, 3 - split);
            assert_eq!(Snapshot::capture(&recovered.tree), full_replay(&records));
        }
    }

    #[test]
    fn test_version_gap_is_format_error() {
        let env = env();
        let records = records();
        write_log(&env, 1, &records[..3], false);
        write_log(&env, 3, &records[3..6], false);
        assert!(matches!(
            env.engine.recover(),
            Err(CheckpointError::Format(_))
        ));
    }

    #[test]
    fn test_gap_after_checkpoint() {
        let env = env();
        let name = env
            .engine
            .write_checkpoint(&Snapshot::capture(&Tree::new()), 4)
            .unwrap();
        write_log(&env, 6, &records()[..1], false);
        assert!(matches!(
            env.engine.recover(),
            Err(CheckpointError::Format(_))
        ));
        assert_eq!(name.version, 4);
    }

    #[test]
    fn test_truncated_current_log_is_tolerated() {
        let env = env();
        let records = records();
        write_log(&env, 1, &records[..3], false);
        write_log(&env, 2, &records[3..6], true);

        let path = env.engine.staging().path(&MetaName::current_log(2).to_string());
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

        let recovered = env.engine.recover().unwrap();
        assert_eq!(recovered.version, 2);
        assert_eq!(Snapshot::capture(&recovered.tree), full_replay(&records[..5]));
    }

    #[test]
    fn test_tampered_sealed_log_is_fatal() {
        let env = env();
        let records = records();
        let name = write_log(&env, 1, &records[..3], false).unwrap();
        let path = env.engine.staging().path(&name.to_string());
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[20] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            env.engine.recover(),
            Err(CheckpointError::OpLog(OpLogError::Crypto(CryptoError::Integrity)))
        ));
    }

    #[test]
    fn test_local_preferred_and_remote_only_logs() {
        let env = env();
        let records = records();
        write_log(&env, 1, &records[..3], false);
        let second = write_log(&env, 2, &records[3..6], false).unwrap();

        // log 1 only survives remotely, log 2 in both places
        let first_local = env
            .engine
            .staging()
            .names()
            .unwrap()
            .into_iter()
            .find(|n| n.starts_with("log.0000000000000001"))
            .unwrap();
        env.engine.staging().delete(&first_local).unwrap();
        // a damaged remote copy of log 2 must not be read
        env.remote
            .tamper(&env.layout.meta_file(&second), |data| data[20] ^= 1)
            .unwrap();

        let recovered = env.engine.recover().unwrap();
        assert_eq!(recovered.version, 2);
        assert_eq!(Snapshot::capture(&recovered.tree), full_replay(&records[..6]));
    }

    #[test]
    fn test_invalid_names_are_skipped() {
        let env = env();
        std::fs::write(env.engine.staging().path("meta.0000000000000009.tmp"), b"junk").unwrap();
        env.remote
            .write_all(&env.layout.meta_path("notes.txt"), b"junk")
            .unwrap();
        let recovered = env.engine.recover().unwrap();
        assert_eq!(recovered.version, 0);
    }

    #[test]
    fn test_empty_current_log_reuses_version() {
        let env = env();
        write_log(&env, 1, &[], true);
        let recovered = env.engine.recover().unwrap();
        assert_eq!(recovered.version, 0);
        assert_eq!(recovered.replayed, 0);
    }

    #[test]
    fn test_local_only_checkpoint_is_uploaded() {
        let env = env();
        let name = env
            .engine
            .write_checkpoint(&Snapshot::capture(&Tree::new()), 0)
            .unwrap();
        env.remote.delete(&env.layout.meta_file(&name)).unwrap();

        let recovered = env.engine.recover().unwrap();
        assert_eq!(recovered.checkpoint, Some(name));
        assert!(env.remote.read_all(&env.layout.meta_file(&name)).is_ok());
    }
}
