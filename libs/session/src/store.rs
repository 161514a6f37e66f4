//! Message Store
//!
//! Sent messages by sequence number plus the two sequence counters. The
//! store is a blocking collaborator called only while the owning session's
//! lock is held, so calls for one session are strictly ordered.
//!
//! [`MemoryStore`] keeps everything in process. Durable stores persist at
//! least the [`StoreSnapshot`] so counters survive a restart.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use fix_types::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait MessageStore: Send {
    fn next_sender_seq_num(&self) -> u64;

    fn next_target_seq_num(&self) -> u64;

    fn set_next_sender_seq_num(&mut self, seq_num: u64) -> StoreResult<()>;

    fn set_next_target_seq_num(&mut self, seq_num: u64) -> StoreResult<()>;

    fn incr_next_sender_seq_num(&mut self) -> StoreResult<()> {
        let next = self.next_sender_seq_num() + 1;
        self.set_next_sender_seq_num(next)
    }

    fn incr_next_target_seq_num(&mut self) -> StoreResult<()> {
        let next = self.next_target_seq_num() + 1;
        self.set_next_target_seq_num(next)
    }

    /// Keep the raw form of sent message `seq_num`.
    fn set(&mut self, seq_num: u64, raw: &[u8]) -> StoreResult<()>;

    /// Stored messages with `begin <= seq <= end`, ascending. Sequence
    /// numbers that were never stored are skipped.
    fn get(&self, begin: u64, end: u64) -> StoreResult<Vec<Vec<u8>>>;

    fn creation_time(&self) -> DateTime<Utc>;

    /// Drop every message, set both counters to 1 and restart the creation
    /// time.
    fn reset(&mut self) -> StoreResult<()>;

    /// Reload state from the backing medium. A no-op for in-memory stores.
    fn refresh(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            next_sender_seq_num: self.next_sender_seq_num(),
            next_target_seq_num: self.next_target_seq_num(),
            creation_time: self.creation_time(),
        }
    }
}

/// Minimum state a durable store must persist per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub next_sender_seq_num: u64,
    pub next_target_seq_num: u64,
    pub creation_time: DateTime<Utc>,
}

/// Creates one store per session
pub trait MessageStoreFactory: Send + Sync {
    fn create(&self, session_id: &SessionId) -> StoreResult<Box<dyn MessageStore>>;
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    messages: BTreeMap<u64, Vec<u8>>,
    next_sender_seq_num: u64,
    next_target_seq_num: u64,
    creation_time: DateTime<Utc>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_creation_time(Utc::now())
    }

    pub fn with_creation_time(creation_time: DateTime<Utc>) -> Self {
        Self {
            messages: BTreeMap::new(),
            next_sender_seq_num: 1,
            next_target_seq_num: 1,
            creation_time,
        }
    }

    /// Store resumed from a persisted snapshot, without messages.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            messages: BTreeMap::new(),
            next_sender_seq_num: snapshot.next_sender_seq_num,
            next_target_seq_num: snapshot.next_target_seq_num,
            creation_time: snapshot.creation_time,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl MessageStore for MemoryStore {
    fn next_sender_seq_num(&self) -> u64 {
        self.next_sender_seq_num
    }

    fn next_target_seq_num(&self) -> u64 {
        self.next_target_seq_num
    }

    fn set_next_sender_seq_num(&mut self, seq_num: u64) -> StoreResult<()> {
        self.next_sender_seq_num = seq_num;
        Ok(())
    }

    fn set_next_target_seq_num(&mut self, seq_num: u64) -> StoreResult<()> {
        self.next_target_seq_num = seq_num;
        Ok(())
    }

    fn set(&mut self, seq_num: u64, raw: &[u8]) -> StoreResult<()> {
        self.messages.insert(seq_num, raw.to_vec());
        Ok(())
    }

    fn get(&self, begin: u64, end: u64) -> StoreResult<Vec<Vec<u8>>> {
        if begin > end {
            return Ok(Vec::new());
        }
        Ok(self.messages.range(begin..=end).map(|(_, raw)| raw.clone()).collect())
    }

    fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    fn reset(&mut self) -> StoreResult<()> {
        debug!(dropped = self.messages.len(), "Resetting memory store");
        self.messages.clear();
        self.next_sender_seq_num = 1;
        self.next_target_seq_num = 1;
        self.creation_time = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStoreFactory;

impl MessageStoreFactory for MemoryStoreFactory {
    fn create(&self, _session_id: &SessionId) -> StoreResult<Box<dyn MessageStore>> {
        Ok(Box::new(MemoryStore::new()))
    }
}
