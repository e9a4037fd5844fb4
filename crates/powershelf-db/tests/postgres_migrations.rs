//! Runs against a live Postgres only when `POWERSHELF_TEST_POSTGRES` is set.

use powershelf_db::{Database, DbConfig};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn migrations_are_idempotent() -> TestResult {
    let Some(config) = DbConfig::from_test_env()? else {
        return Ok(());
    };
    let db = Database::connect(&config)?;
    db.ping().await?;

    db.migrate().await?;
    assert_eq!(db.migrate().await?, 0);
    assert_eq!(db.rollback(chrono::Utc::now()).await?, 0);

    let client = db.client().await?;
    let row = client
        .query_one(
            "SELECT count(*) FROM pg_indexes WHERE indexname = 'firmware_update_one_in_flight_idx'",
            &[],
        )
        .await?;
    assert_eq!(row.try_get::<_, i64>(0)?, 1);
    Ok(())
}

#[test]
fn connect_rejects_invalid_config() {
    let config = DbConfig {
        host: String::new(),
        ..DbConfig::default()
    };
    assert!(Database::connect(&config).is_err());
}
