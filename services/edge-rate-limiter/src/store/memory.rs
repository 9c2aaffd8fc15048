// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-memory window store for single-instance deployments and tests.

use super::{Decide, WindowStore};
use crate::error::{Result, StoreError};
use crate::record::{Committed, Mutation, WindowRecord};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// `DashMap`-backed store. Each transaction holds the entry lock for its key
/// while deciding, so same-key transactions serialize and other keys proceed.
#[derive(Debug, Default)]
pub struct MemoryWindowStore {
    records: DashMap<String, WindowRecord>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a record directly, bypassing the transaction protocol.
    pub fn insert(&self, identifier: &str, record: WindowRecord) {
        self.records.insert(identifier.to_string(), record);
    }

    fn apply(&self, identifier: &str, decide: Decide<'_>) -> Result<Committed> {
        match self.records.entry(identifier.to_string()) {
            Entry::Occupied(mut occupied) => {
                let mutation = decide(Some(occupied.get()));
                let record = occupied.get_mut();
                match mutation {
                    Mutation::Start { reset_time } => *record = WindowRecord::fresh(reset_time),
                    Mutation::Increment => record.count += 1,
                    Mutation::Abort => {}
                }
                Ok(Committed {
                    mutation,
                    record: Some(*record),
                })
            }
            Entry::Vacant(vacant) => match decide(None) {
                Mutation::Start { reset_time } => {
                    let record = *vacant.insert(WindowRecord::fresh(reset_time));
                    Ok(Committed {
                        mutation: Mutation::Start { reset_time },
                        record: Some(record),
                    })
                }
                Mutation::Abort => Ok(Committed {
                    mutation: Mutation::Abort,
                    record: None,
                }),
                mutation @ Mutation::Increment => Err(StoreError::MissingRecord {
                    identifier: identifier.to_string(),
                    mutation: mutation.name(),
                }),
            },
        }
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn transact(&self, identifier: &str, decide: Decide<'_>) -> Result<Committed> {
        self.apply(identifier, decide)
    }

    async fn get(&self, identifier: &str) -> Result<Option<WindowRecord>> {
        Ok(self.records.get(identifier).map(|r| *r))
    }

    async fn delete(&self, identifier: &str) -> Result<()> {
        self.records.remove(identifier);
        Ok(())
    }

    async fn delete_expired(&self, now: i64, limit: usize) -> Result<usize> {
        let candidates: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.reset_time < now)
            .take(limit)
            .map(|r| r.key().clone())
            .collect();

        let mut removed = 0;
        for identifier in candidates {
            // A request may have opened a new window since the scan
            if self
                .records
                .remove_if(&identifier, |_, r| r.reset_time < now)
                .is_some()
            {
                removed += 1;
            }
        }

        debug!(removed, "Deleted expired window records");
        Ok(removed)
    }
}
