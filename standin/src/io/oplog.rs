//! Operation log and session flag on top of a [`SessionStore`].
//!
//! The log is append-only while a session is staged and is consumed exactly
//! once by restore. There is no indexed access: the only way
//! to read records for replay is [`OperationLog::drain_for_replay`], which
//! yields newest-first.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::types::CompensationRecord;
use crate::error::{Result, StandinError};
use crate::io::store::{IN_USE_KEY, OPERATIONS_KEY, RESTORE_HALTED_KEY, SessionStore};

/// Ordered compensation records for the active session.
pub struct OperationLog<'a, S: SessionStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: SessionStore + ?Sized> OperationLog<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Append `record` at the tail. Durable once this returns.
    pub fn append(&mut self, record: CompensationRecord) -> Result<()> {
        let mut records = self.load()?.unwrap_or_default();
        debug!(position = records.len() + 1, %record, "append compensation");
        records.push(record);
        let value = serde_json::to_value(&records).map_err(encode_error)?;
        self.store.set(OPERATIONS_KEY, value)
    }

    /// True when a log exists, even if it holds no records yet.
    pub fn is_present(&self) -> Result<bool> {
        Ok(self.load()?.is_some())
    }

    /// True when nothing is pending (no log, or an empty one).
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.map_or(0, |records| records.len()))
    }

    /// Create an empty log if none exists. Existing records are kept.
    pub fn ensure_started(&mut self) -> Result<()> {
        if self.is_present()? {
            return Ok(());
        }
        self.store.set(OPERATIONS_KEY, Value::Array(Vec::new()))
    }

    /// Insertion-ordered copy of the pending records, for display only.
    pub fn pending(&self) -> Result<Vec<CompensationRecord>> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Take every record and clear the log in one step.
    ///
    /// The returned queue yields records in reverse insertion order.
    pub fn drain_for_replay(&mut self) -> Result<ReplayQueue> {
        let records = self.load()?.unwrap_or_default();
        self.store.clear(OPERATIONS_KEY)?;
        debug!(count = records.len(), "drained operation log");
        Ok(ReplayQueue { records })
    }

    fn load(&self) -> Result<Option<Vec<CompensationRecord>>> {
        match self.store.get(OPERATIONS_KEY)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| StandinError::Store {
                    location: OPERATIONS_KEY.to_string(),
                    message: format!("decode records: {err}"),
                }),
        }
    }
}

fn encode_error(err: serde_json::Error) -> StandinError {
    StandinError::Store {
        location: OPERATIONS_KEY.to_string(),
        message: format!("encode records: {err}"),
    }
}

/// Drained records, yielded newest first with their 1-based log position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayQueue {
    records: Vec<CompensationRecord>,
}

impl ReplayQueue {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Iterator for ReplayQueue {
    type Item = (usize, CompensationRecord);

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.pop()?;
        Some((self.records.len() + 1, record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.records.len(), Some(self.records.len()))
    }
}

impl ExactSizeIterator for ReplayQueue {}

/// "Session in use" marker used to detect a stale, unfinished session.
pub struct SessionFlag<'a, S: SessionStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: SessionStore + ?Sized> SessionFlag<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    pub fn is_set(&self) -> Result<bool> {
        Ok(matches!(self.store.get(IN_USE_KEY)?, Some(Value::Bool(true))))
    }

    pub fn set(&mut self) -> Result<()> {
        self.store.set(IN_USE_KEY, Value::Bool(true))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.clear(IN_USE_KEY)
    }
}

/// Where an earlier restore stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HaltedRestore {
    /// 1-based log position of the failed record.
    pub index: usize,
    pub record: CompensationRecord,
}

/// Marker left by a restore that halted part way.
///
/// While it is set the backup tree may hold the only copy of originals whose
/// records were never replayed, so nothing may clean it up implicitly.
pub struct HaltMarker<'a, S: SessionStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: SessionStore + ?Sized> HaltMarker<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Result<Option<HaltedRestore>> {
        match self.store.get(RESTORE_HALTED_KEY)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| StandinError::Store {
                    location: RESTORE_HALTED_KEY.to_string(),
                    message: format!("decode halted restore: {err}"),
                }),
        }
    }

    pub fn set(&mut self, halted: &HaltedRestore) -> Result<()> {
        let value = serde_json::to_value(halted).map_err(|err| StandinError::Store {
            location: RESTORE_HALTED_KEY.to_string(),
            message: format!("encode halted restore: {err}"),
        })?;
        self.store.set(RESTORE_HALTED_KEY, value)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.clear(RESTORE_HALTED_KEY)
    }
}
