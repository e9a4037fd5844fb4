//! Runs against a live Postgres only when `POWERSHELF_TEST_POSTGRES` is set.

use powershelf_db::{Database, DbConfig};
use powershelf_errors::{Classify, ErrorCategory};
use powershelf_registry::{DeviceRegistry, PostgresDeviceRegistry};
use powershelf_types::{MacAddr, Pmc, Vendor};

type TestResult = Result<(), Box<dyn std::error::Error>>;

async fn registry() -> Result<Option<PostgresDeviceRegistry>, Box<dyn std::error::Error>> {
    let Some(config) = DbConfig::from_test_env()? else {
        return Ok(None);
    };
    let db = Database::connect(&config)?;
    db.migrate().await?;
    db.client()
        .await?
        .batch_execute("DELETE FROM pmc WHERE mac_address::text LIKE '02:00:00:00:00:%'")
        .await?;
    Ok(Some(PostgresDeviceRegistry::new(db)))
}

fn pmc(last: u8, ip: &str) -> Result<Pmc, std::net::AddrParseError> {
    Ok(Pmc::new(
        MacAddr::new([0x02, 0, 0, 0, 0, last]),
        ip.parse()?,
        Vendor::Liteon,
    ))
}

#[tokio::test]
async fn constraints_surface_as_already_registered() -> TestResult {
    let Some(registry) = registry().await? else {
        return Ok(());
    };

    let first = pmc(1, "198.51.100.1")?;
    registry.register_device(&first).await?;
    assert!(registry.is_registered(first.mac).await?);
    assert_eq!(registry.get_device(first.mac).await?, first);

    let same_mac = registry.register_device(&pmc(1, "198.51.100.2")?).await;
    assert_eq!(
        same_mac.err().map(|e| e.category()),
        Some(ErrorCategory::Conflict)
    );

    let same_ip = registry.register_device(&pmc(2, "198.51.100.1")?).await;
    assert_eq!(
        same_ip.err().map(|e| e.category()),
        Some(ErrorCategory::Conflict)
    );

    assert_eq!(registry.get_device(first.mac).await?, first);
    assert!(
        registry
            .get_device(pmc(3, "198.51.100.3")?.mac)
            .await
            .err()
            .is_some_and(|e| e.is_not_found())
    );
    Ok(())
}
