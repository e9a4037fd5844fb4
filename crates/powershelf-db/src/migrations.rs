//! Embedded schema migrations.
//!
//! Files are named `ID_NAME.up.sql` with a matching `ID_NAME.down.sql`; the ID
//! is a timestamp, so lexical order is apply order. Everything runs in a
//! single transaction holding `LOCK TABLE migrations`, which serialises
//! concurrent service instances. An applied migration whose text changed
//! aborts the run unless the file contains [`ALLOW_HASH_CHANGE`]. A file may
//! be split into separately executed statements with [`SECTION_MARKER`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use tokio_postgres::Transaction;
use tracing::info;

use crate::{DbError, Result};

/// Marker that splits a migration into separately executed statements.
pub const SECTION_MARKER: &str = "-- SECTION";

/// Marker that permits editing an already-applied migration.
pub const ALLOW_HASH_CHANGE: &str = "Allow hash changing";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS migrations (
    id TEXT NOT NULL PRIMARY KEY,
    name TEXT NOT NULL,
    hash TEXT NOT NULL,
    applied_date TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

/// A migration file compiled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedFile {
    pub path: &'static str,
    pub contents: &'static str,
}

macro_rules! embed {
    ($($file:literal),* $(,)?) => {
        &[$(EmbeddedFile {
            path: $file,
            contents: include_str!(concat!("../migrations/", $file)),
        }),*]
    };
}

/// Every migration shipped with this build.
pub static EMBEDDED: &[EmbeddedFile] = embed![
    "20250601000000_pmc.up.sql",
    "20250601000000_pmc.down.sql",
    "20250601000001_firmwareupdate.up.sql",
    "20250601000001_firmwareupdate.down.sql",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    fn suffix(self) -> &'static str {
        match self {
            Direction::Up => ".up.sql",
            Direction::Down => ".down.sql",
        }
    }

    fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// A migration file resolved to its id and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub id: String,
    pub name: String,
    pub contents: &'static str,
}

impl Migration {
    pub fn hash(&self) -> String {
        content_hash(self.contents)
    }

    pub fn sections(&self) -> impl Iterator<Item = &'static str> {
        self.contents
            .split(SECTION_MARKER)
            .filter(|s| !s.trim().is_empty())
    }
}

/// A row of the `migrations` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub hash: String,
    pub applied: DateTime<Utc>,
}

/// What to do with one migration during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Apply(Migration),
    Revert(Migration),
}

/// md5 hex digest of a migration's text.
pub fn content_hash(contents: &str) -> String {
    hex::encode(Md5::digest(contents.as_bytes()))
}

/// Split `ID_NAME.up.sql` (or `.down.sql`) into id and name. Anything else is
/// not a migration in the requested direction.
pub fn parse_filename(path: &str, direction: Direction) -> Option<(&str, &str)> {
    let stem = path.strip_suffix(direction.suffix())?;
    let (id, name) = stem.split_once('_')?;
    if id.is_empty() || name.is_empty() || name.contains('_') {
        return None;
    }
    Some((id, name))
}

/// Migrations in `files` for `direction`, sorted by id.
///
/// # Errors
///
/// Fails when a file lacks its matching up/down counterpart.
pub fn collect(files: &[EmbeddedFile], direction: Direction) -> Result<Vec<Migration>> {
    let mut found = Vec::new();
    for file in files {
        let Some((id, name)) = parse_filename(file.path, direction) else {
            continue;
        };
        let counterpart = format!("{id}_{name}{}", direction.opposite().suffix());
        if !files.iter().any(|f| f.path == counterpart) {
            return Err(DbError::migration(
                id,
                name,
                format!("{} has no matching {counterpart}", file.path),
            ));
        }
        found.push(Migration {
            id: id.to_string(),
            name: name.to_string(),
            contents: file.contents,
        });
    }
    found.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(found)
}

/// Decide which migrations to apply given what the database has recorded.
///
/// # Errors
///
/// Fails when an applied migration's hash no longer matches and the file does
/// not opt in with [`ALLOW_HASH_CHANGE`].
pub fn plan_up(
    available: Vec<Migration>,
    applied: &HashMap<String, AppliedMigration>,
) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for migration in available {
        match applied.get(&migration.id) {
            Some(existing) => {
                let altered = existing.hash != migration.hash();
                if altered && !migration.contents.contains(ALLOW_HASH_CHANGE) {
                    return Err(DbError::migration(
                        migration.id,
                        migration.name,
                        "hash does not match already applied migration; something altered it",
                    ));
                }
            }
            None => steps.push(Step::Apply(migration)),
        }
    }
    Ok(steps)
}

/// Down migrations for everything applied after `since`, newest first.
pub fn plan_down(
    available: Vec<Migration>,
    applied: &HashMap<String, AppliedMigration>,
    since: DateTime<Utc>,
) -> Vec<Step> {
    let mut steps: Vec<Step> = available
        .into_iter()
        .filter(|m| applied.get(&m.id).is_some_and(|a| a.applied > since))
        .map(Step::Revert)
        .collect();
    steps.reverse();
    steps
}

/// Apply all pending up migrations. Returns how many were applied.
///
/// # Errors
///
/// Any failure rolls the whole run back.
pub async fn migrate(client: &mut deadpool_postgres::Object) -> Result<usize> {
    run(client, None).await
}

/// Revert migrations applied after `since`. Returns how many were reverted.
///
/// # Errors
///
/// Any failure rolls the whole run back.
pub async fn rollback(
    client: &mut deadpool_postgres::Object,
    since: DateTime<Utc>,
) -> Result<usize> {
    run(client, Some(since)).await
}

async fn run(
    client: &mut deadpool_postgres::Object,
    since: Option<DateTime<Utc>>,
) -> Result<usize> {
    let tx = client.transaction().await?;
    tx.batch_execute(CREATE_TABLE).await?;
    tx.batch_execute("LOCK TABLE migrations").await?;

    let applied = load_applied(&*tx).await?;
    let steps = match since {
        None => plan_up(collect(EMBEDDED, Direction::Up)?, &applied)?,
        Some(since) => plan_down(collect(EMBEDDED, Direction::Down)?, &applied, since),
    };

    if steps.is_empty() {
        info!("Database schema up to date, no migrations applied");
    }
    for step in &steps {
        execute(&*tx, step).await?;
    }

    tx.commit().await?;
    Ok(steps.len())
}

async fn load_applied(client: &Transaction<'_>) -> Result<HashMap<String, AppliedMigration>> {
    let rows = client
        .query("SELECT id, hash, applied_date FROM migrations", &[])
        .await?;
    let mut applied = HashMap::with_capacity(rows.len());
    for row in rows {
        applied.insert(
            row.try_get::<_, String>(0)?,
            AppliedMigration {
                hash: row.try_get(1)?,
                applied: row.try_get(2)?,
            },
        );
    }
    Ok(applied)
}

async fn execute(client: &Transaction<'_>, step: &Step) -> Result<()> {
    let migration = match step {
        Step::Apply(m) => {
            info!(id = %m.id, name = %m.name, "Applying new migration");
            m
        }
        Step::Revert(m) => {
            info!(id = %m.id, name = %m.name, "Rolling back migration");
            m
        }
    };

    for section in migration.sections() {
        client.batch_execute(section).await.map_err(|e| {
            DbError::migration(
                migration.id.as_str(),
                migration.name.as_str(),
                format!("{e}; command: {}", section.trim()),
            )
        })?;
    }

    match step {
        Step::Apply(m) => {
            client
                .execute(
                    "INSERT INTO migrations (id, name, hash) VALUES ($1, $2, $3)",
                    &[&m.id, &m.name, &m.hash()],
                )
                .await?;
        }
        Step::Revert(m) => {
            client
                .execute("DELETE FROM migrations WHERE id = $1", &[&m.id])
                .await?;
        }
    }
    Ok(())
}
