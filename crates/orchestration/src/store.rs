//! In-process [`AppStore`] used by the CLI.

use std::collections::HashMap;

use applet::{AppRecord, AppStore, ArtifactIdentity};
use parking_lot::RwLock;

/// Keeps app records in memory for the life of the process.
#[derive(Debug, Default)]
pub struct InMemoryAppStore {
    records: RwLock<HashMap<ArtifactIdentity, AppRecord>>,
}

impl InMemoryAppStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored apps.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl AppStore for InMemoryAppStore {
    fn load(&self, identity: &ArtifactIdentity) -> Option<AppRecord> {
        self.records.read().get(identity).cloned()
    }

    fn save(&self, record: AppRecord) {
        self.records.write().insert(record.identity.clone(), record);
    }
}
