mod cli;
mod config;
mod storage;

use crate::cli::ConfigCommand;
use clap::Parser;
use color_eyre::Result;
use dp3t_core::{
    keys::Epoch,
    records::{Record, SecretRecords, StoreError},
    storage::SecureByteStore,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HEALTH_PROBE_KEY: &str = "org.dpppt.health";

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command.unwrap_or(cli::Command::Status) {
        cli::Command::Status => {
            let records = storage::records_from_config(&config)?;
            for line in describe_records(&records, Epoch::today()) {
                println!("{line}");
            }
        }
        cli::Command::Clear { yes } => {
            if !yes {
                color_eyre::eyre::bail!("refusing to erase records without --yes");
            }
            let records = storage::records_from_config(&config)?;
            records.clear_all();
            info!("secure records erased");
            println!("All records cleared");
        }
        cli::Command::Health => {
            let store = storage::byte_store_from_config(&config)?;
            run_store_health(&store)?;
            println!("Storage: ok");
        }
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
        cli::Command::Version => print_version(),
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("dp3t-store {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

/// One status line per record. Never prints key material.
fn describe_records(records: &dyn SecretRecords, today: Epoch) -> Vec<String> {
    let keys = match records.secret_keys() {
        Ok(keys) => match keys.iter().map(|k| k.epoch).max() {
            Some(latest) => format!("{} key(s), latest {latest}", keys.len()),
            None => "empty list".to_string(),
        },
        Err(err) => describe_error(&err),
    };
    let eph_ids = match records.eph_ids_today() {
        Ok(ids) if ids.is_for(today) => format!("{} id(s) for {}", ids.eph_ids.len(), ids.day),
        Ok(ids) => format!("stale, {} id(s) for {}", ids.eph_ids.len(), ids.day),
        Err(err) => describe_error(&err),
    };

    vec![
        format!("{}: {keys}", Record::SecretKeys),
        format!("{}: {eph_ids}", Record::EphIdsToday),
    ]
}

fn describe_error(err: &StoreError) -> String {
    match err {
        StoreError::NotFound { .. } => "absent".to_string(),
        StoreError::Inaccessible { reason, .. } => format!("locked ({reason})"),
        StoreError::Corrupt { .. } => "corrupt (run `dp3t-store clear --yes`)".to_string(),
    }
}

/// Runs a quick put/get/delete cycle against the byte store on a scratch key.
fn run_store_health<S: SecureByteStore + ?Sized>(store: &S) -> Result<()> {
    let payload = b"ok";
    store
        .put(HEALTH_PROBE_KEY, payload)
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    let round_trip = store.get(HEALTH_PROBE_KEY);
    store.delete(HEALTH_PROBE_KEY);
    let round_trip = round_trip.map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;

    if round_trip != payload {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dp3t_core::{
        keys::{EphIdsForDay, Epoch, SecretKey},
        storage::InMemorySecureStore,
    };
    use dp3t_records::SecureRecordStore;

    fn day(d: u32) -> Epoch {
        Epoch::from_date(NaiveDate::from_ymd_opt(2020, 5, d).expect("valid date"))
    }

    #[test]
    fn health_check_with_test_store_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path());
        run_store_health(&store).expect("health check should succeed");
        assert!(matches!(
            store.get(HEALTH_PROBE_KEY),
            Err(dp3t_core::storage::AccessError::NotFound { .. })
        ));
    }

    #[test]
    fn health_check_reports_locked_store() {
        let store = InMemorySecureStore::new();
        store.lock();
        assert!(run_store_health(&store).is_err());
    }

    #[test]
    fn status_describes_each_record_state() {
        let backend = InMemorySecureStore::new();
        let records = SecureRecordStore::new(backend.clone());

        assert_eq!(
            describe_records(&records, day(5)),
            vec!["secret-keys: absent", "eph-ids-today: absent"]
        );

        records
            .set_secret_keys(&[
                SecretKey::new(day(4), vec![1; 32]),
                SecretKey::new(day(5), vec![2; 32]),
            ])
            .expect("set keys");
        records
            .set_eph_ids_today(&EphIdsForDay::new(day(5), vec![]))
            .expect("set ids");
        assert_eq!(
            describe_records(&records, day(5)),
            vec![
                "secret-keys: 2 key(s), latest 2020-05-05",
                "eph-ids-today: 0 id(s) for 2020-05-05",
            ]
        );
        assert_eq!(
            describe_records(&records, day(6))[1],
            "eph-ids-today: stale, 0 id(s) for 2020-05-05"
        );

        backend.insert_raw(Record::SecretKeys.key(), b"garbage");
        backend.lock();
        let lines = describe_records(&records, day(5));
        assert!(lines[0].starts_with("secret-keys: locked"));

        backend.unlock();
        let lines = describe_records(&records, day(5));
        assert!(lines[0].starts_with("secret-keys: corrupt"));
    }
}
