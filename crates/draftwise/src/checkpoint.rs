//! Local cache of the checkpoints known for the open session.
//!
//! Checkpoints are owned by the backend. The log only carries lightweight
//! references; snapshot content is fetched on demand and kept here so it is
//! never duplicated into the conversation. The cache is dropped whenever
//! the session changes.

use crate::log::ConversationLog;
use crate::types::{Checkpoint, CheckpointId, TurnId};
use std::collections::BTreeMap;

/// What the session knows about one checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedCheckpoint {
    pub id: CheckpointId,
    /// Turn the checkpoint was made from, when known.
    pub turn_id: Option<TurnId>,
    /// Full snapshot, present once fetched (or returned by create).
    pub snapshot: Option<Checkpoint>,
}

#[derive(Debug, Clone, Default)]
pub struct CheckpointManager {
    cache: BTreeMap<CheckpointId, CachedCheckpoint>,
}

impl CheckpointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the cache from the references in `log`. Content is not
    /// known yet for any of them.
    pub fn seed_from_log(&mut self, log: &ConversationLog) {
        self.cache = log
            .checkpoints()
            .map(|(message, id)| {
                (
                    id,
                    CachedCheckpoint {
                        id,
                        turn_id: message.turn_id,
                        snapshot: None,
                    },
                )
            })
            .collect();
    }

    /// Record a checkpoint the backend just created for `turn_id`.
    pub fn record_created(&mut self, turn_id: TurnId, checkpoint: Checkpoint) {
        let id = checkpoint.id;
        self.cache.insert(
            id,
            CachedCheckpoint {
                id,
                turn_id: Some(turn_id),
                snapshot: Some(checkpoint),
            },
        );
    }

    /// Store fetched snapshot content, keeping any known turn link.
    pub fn record_fetched(&mut self, checkpoint: Checkpoint) {
        let id = checkpoint.id;
        self.cache
            .entry(id)
            .and_modify(|c| c.snapshot = Some(checkpoint.clone()))
            .or_insert(CachedCheckpoint {
                id,
                turn_id: None,
                snapshot: Some(checkpoint),
            });
    }

    /// Drop a checkpoint from the cache. Log references are left alone.
    pub fn remove(&mut self, id: CheckpointId) -> bool {
        self.cache.remove(&id).is_some()
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    pub fn get(&self, id: CheckpointId) -> Option<&CachedCheckpoint> {
        self.cache.get(&id)
    }

    /// Cached snapshot content, if it has been fetched.
    pub fn content(&self, id: CheckpointId) -> Option<&str> {
        self.cache
            .get(&id)
            .and_then(|c| c.snapshot.as_ref())
            .map(|s| s.content.as_str())
    }

    /// The checkpoint linked to `turn_id`, if any.
    pub fn for_turn(&self, turn_id: TurnId) -> Option<&CachedCheckpoint> {
        self.cache.values().find(|c| c.turn_id == Some(turn_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedCheckpoint> {
        self.cache.values()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
