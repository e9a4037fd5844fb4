use async_trait::async_trait;
use powershelf_db::{Database, Row};
use powershelf_types::{Component, MacAddr};
use tracing::warn;

use super::FirmwareUpdateStore;
use crate::{FirmwareError, FirmwareState, FirmwareUpdate, FirmwareVersion, Result};

const COLUMNS: &str = "id, pmc_mac_address::text, component, version_from, version_to, state, \
     last_transition_time, updated_at, created_at, job_id, error_message";

const INSERT: &str = "INSERT INTO firmware_update \
     (pmc_mac_address, component, version_from, version_to, state) \
     VALUES ($1::text::macaddr, $2, $3, $4, 'Queued') \
     RETURNING id, pmc_mac_address::text, component, version_from, version_to, state, \
     last_transition_time, updated_at, created_at, job_id, error_message";

const SET_STATE: &str = "UPDATE firmware_update SET \
     last_transition_time = CASE WHEN state <> $2 THEN NOW() ELSE last_transition_time END, \
     state = $2, error_message = $3, updated_at = NOW() \
     WHERE id = $1";

const TOUCH: &str = "UPDATE firmware_update SET updated_at = NOW() WHERE id = $1";

/// Records stored in the `firmware_update` table.
///
/// The partial unique index on `(pmc_mac_address, component)` for
/// non-terminal states turns a racing second enqueue into
/// [`FirmwareError::InFlight`].
#[derive(Clone)]
pub struct PostgresFirmwareUpdateStore {
    db: Database,
}

impl PostgresFirmwareUpdateStore {
    /// Use an already migrated database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn decode(row: &Row) -> Result<FirmwareUpdate> {
    let mac: String = row.try_get(1)?;
    let component: String = row.try_get(2)?;
    let version_from: String = row.try_get(3)?;
    let version_to: String = row.try_get(4)?;
    let state: String = row.try_get(5)?;

    let corrupt = |column: &str, value: &str, e: &dyn std::fmt::Display| {
        FirmwareError::Decode(format!("{column} {value:?}: {e}"))
    };

    Ok(FirmwareUpdate {
        id: row.try_get(0)?,
        mac: mac
            .parse()
            .map_err(|e| corrupt("pmc_mac_address", &mac, &e))?,
        component: component
            .parse()
            .map_err(|e| corrupt("component", &component, &e))?,
        version_from: version_from
            .parse::<FirmwareVersion>()
            .map_err(|e| corrupt("version_from", &version_from, &e))?,
        version_to: version_to
            .parse::<FirmwareVersion>()
            .map_err(|e| corrupt("version_to", &version_to, &e))?,
        state: state
            .parse::<FirmwareState>()
            .map_err(|e| corrupt("state", &state, &e))?,
        last_transition_time: row.try_get(6)?,
        updated_at: row.try_get(7)?,
        created_at: row.try_get(8)?,
        job_id: row.try_get(9)?,
        error_message: row.try_get(10)?,
    })
}

#[async_trait]
impl FirmwareUpdateStore for PostgresFirmwareUpdateStore {
    async fn create(
        &self,
        mac: MacAddr,
        component: Component,
        version_from: FirmwareVersion,
        version_to: FirmwareVersion,
    ) -> Result<FirmwareUpdate> {
        let client = self.db.client().await?;
        let row = client
            .query_one(
                INSERT,
                &[
                    &mac.to_string(),
                    &component.as_str(),
                    &version_from.to_string(),
                    &version_to.to_string(),
                ],
            )
            .await
            .map_err(|e| {
                if powershelf_db::is_unique_violation(&e) {
                    return FirmwareError::InFlight {
                        pmc: mac,
                        component,
                    };
                }
                warn!(
                    pmc = %mac,
                    component = %component,
                    error = %e,
                    "failed to create firmware update"
                );
                FirmwareError::from(e)
            })?;
        decode(&row)
    }

    async fn latest(&self, mac: MacAddr, component: Component) -> Result<Option<FirmwareUpdate>> {
        let client = self.db.client().await?;
        let query = format!(
            "SELECT {COLUMNS} FROM firmware_update \
             WHERE pmc_mac_address = $1::text::macaddr AND component = $2 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let row = client
            .query_opt(query.as_str(), &[&mac.to_string(), &component.as_str()])
            .await?;
        row.as_ref().map(decode).transpose()
    }

    async fn pending(&self) -> Result<Vec<FirmwareUpdate>> {
        let client = self.db.client().await?;
        let query = format!(
            "SELECT {COLUMNS} FROM firmware_update \
             WHERE state NOT IN ('Completed', 'Failed') \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = client.query(query.as_str(), &[]).await?;
        rows.iter().map(decode).collect()
    }

    async fn history(&self, mac: MacAddr, component: Component) -> Result<Vec<FirmwareUpdate>> {
        let client = self.db.client().await?;
        let query = format!(
            "SELECT {COLUMNS} FROM firmware_update \
             WHERE pmc_mac_address = $1::text::macaddr AND component = $2 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = client
            .query(query.as_str(), &[&mac.to_string(), &component.as_str()])
            .await?;
        rows.iter().map(decode).collect()
    }

    async fn set_state(&self, id: i64, state: FirmwareState, error: Option<String>) -> Result<()> {
        let client = self.db.client().await?;
        let updated = client
            .execute(SET_STATE, &[&id, &state.as_str(), &error])
            .await?;
        if updated == 0 {
            return Err(FirmwareError::RecordNotFound(id));
        }
        Ok(())
    }

    async fn touch(&self, id: i64) -> Result<()> {
        let client = self.db.client().await?;
        let updated = client.execute(TOUCH, &[&id]).await?;
        if updated == 0 {
            return Err(FirmwareError::RecordNotFound(id));
        }
        Ok(())
    }
}
