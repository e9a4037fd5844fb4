use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use powershelf_types::{Component, MacAddr};

use super::FirmwareUpdateStore;
use crate::{FirmwareError, FirmwareState, FirmwareUpdate, FirmwareVersion, Result};

#[derive(Default)]
struct Records {
    next_id: i64,
    // Insertion order is creation order.
    rows: Vec<FirmwareUpdate>,
}

/// Process-local record store.
///
/// One lock covers the in-flight check and the insert in [`create`], the
/// same guarantee the partial unique index gives the Postgres backend.
///
/// [`create`]: FirmwareUpdateStore::create
#[derive(Default)]
pub struct InMemoryFirmwareUpdateStore {
    records: RwLock<Records>,
}

impl InMemoryFirmwareUpdateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as-is, keeping its timestamps. The id is reassigned.
    pub fn restore(&self, mut record: FirmwareUpdate) -> FirmwareUpdate {
        let mut records = self.records.write();
        records.next_id = records.next_id.saturating_add(1);
        record.id = records.next_id;
        records.rows.push(record.clone());
        record
    }
}

fn matches(record: &FirmwareUpdate, mac: MacAddr, component: Component) -> bool {
    record.mac == mac && record.component == component
}

#[async_trait]
impl FirmwareUpdateStore for InMemoryFirmwareUpdateStore {
    async fn create(
        &self,
        mac: MacAddr,
        component: Component,
        version_from: FirmwareVersion,
        version_to: FirmwareVersion,
    ) -> Result<FirmwareUpdate> {
        let mut records = self.records.write();
        if records
            .rows
            .iter()
            .any(|r| matches(r, mac, component) && !r.is_terminal())
        {
            return Err(FirmwareError::InFlight {
                pmc: mac,
                component,
            });
        }

        records.next_id = records.next_id.saturating_add(1);
        let now = Utc::now();
        let record = FirmwareUpdate {
            id: records.next_id,
            mac,
            component,
            version_from,
            version_to,
            state: FirmwareState::Queued,
            last_transition_time: now,
            updated_at: now,
            created_at: now,
            job_id: None,
            error_message: None,
        };
        records.rows.push(record.clone());
        Ok(record)
    }

    async fn latest(&self, mac: MacAddr, component: Component) -> Result<Option<FirmwareUpdate>> {
        Ok(self
            .records
            .read()
            .rows
            .iter()
            .rev()
            .find(|r| matches(r, mac, component))
            .cloned())
    }

    async fn pending(&self) -> Result<Vec<FirmwareUpdate>> {
        Ok(self
            .records
            .read()
            .rows
            .iter()
            .rev()
            .filter(|r| !r.is_terminal())
            .cloned()
            .collect())
    }

    async fn history(&self, mac: MacAddr, component: Component) -> Result<Vec<FirmwareUpdate>> {
        Ok(self
            .records
            .read()
            .rows
            .iter()
            .rev()
            .filter(|r| matches(r, mac, component))
            .cloned()
            .collect())
    }

    async fn set_state(&self, id: i64, state: FirmwareState, error: Option<String>) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(FirmwareError::RecordNotFound(id))?;
        let now = Utc::now();
        if record.state != state {
            record.state = state;
            record.last_transition_time = now;
        }
        record.error_message = error;
        record.updated_at = now;
        Ok(())
    }

    async fn touch(&self, id: i64) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(FirmwareError::RecordNotFound(id))?;
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    const MAC: MacAddr = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);

    fn v(major: u32, minor: u32, patch: u32) -> FirmwareVersion {
        FirmwareVersion::new(major, minor, patch)
    }

    #[tokio::test]
    async fn test_create_is_queued() -> TestResult {
        let store = InMemoryFirmwareUpdateStore::new();
        let record = store.create(MAC, Component::Pmc, v(1, 2, 0), v(1, 3, 0)).await?;
        assert_eq!(record.state, FirmwareState::Queued);
        assert_eq!(record.version_from, v(1, 2, 0));
        assert_eq!(record.version_to, v(1, 3, 0));
        assert_eq!(store.latest(MAC, Component::Pmc).await?, Some(record));
        Ok(())
    }

    #[tokio::test]
    async fn test_one_in_flight_per_component() -> TestResult {
        let store = InMemoryFirmwareUpdateStore::new();
        let first = store.create(MAC, Component::Pmc, v(1, 2, 0), v(1, 3, 0)).await?;

        let second = store.create(MAC, Component::Pmc, v(1, 2, 0), v(1, 3, 0)).await;
        assert!(matches!(second, Err(FirmwareError::InFlight { .. })));

        // Another component is independent.
        store.create(MAC, Component::Psu, v(1, 0, 0), v(1, 1, 0)).await?;

        store.set_state(first.id, FirmwareState::Failed, Some("boom".into())).await?;
        let retry = store.create(MAC, Component::Pmc, v(1, 2, 0), v(1, 3, 0)).await?;
        assert_eq!(store.history(MAC, Component::Pmc).await?.len(), 2);
        assert_eq!(store.latest(MAC, Component::Pmc).await?.map(|r| r.id), Some(retry.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_state_moves_transition_time_only_on_change() -> TestResult {
        let store = InMemoryFirmwareUpdateStore::new();
        let record = store.create(MAC, Component::Pmc, v(1, 2, 0), v(1, 3, 0)).await?;

        store.set_state(record.id, FirmwareState::Queued, Some("still".into())).await?;
        let same = store.latest(MAC, Component::Pmc).await?.ok_or("missing")?;
        assert_eq!(same.last_transition_time, record.last_transition_time);
        assert_eq!(same.error_message.as_deref(), Some("still"));
        assert!(same.updated_at >= record.updated_at);

        store.set_state(record.id, FirmwareState::Verifying, None).await?;
        let moved = store.latest(MAC, Component::Pmc).await?.ok_or("missing")?;
        assert_eq!(moved.state, FirmwareState::Verifying);
        assert!(moved.last_transition_time >= record.last_transition_time);
        assert_eq!(moved.error_message, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_pending_excludes_terminal() -> TestResult {
        let store = InMemoryFirmwareUpdateStore::new();
        let a = store.create(MAC, Component::Pmc, v(1, 2, 0), v(1, 3, 0)).await?;
        let b = store.create(MAC, Component::Psu, v(1, 0, 0), v(1, 1, 0)).await?;
        store.set_state(a.id, FirmwareState::Failed, None).await?;

        let pending = store.pending().await?;
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b.id]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let store = InMemoryFirmwareUpdateStore::new();
        assert!(matches!(
            store.touch(42).await,
            Err(FirmwareError::RecordNotFound(42))
        ));
    }
}
