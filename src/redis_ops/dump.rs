use anyhow::{Context, Result};
use std::time::Duration;

use crate::{
    config::SCAN_PATTERN,
    keyspace::KeySpace,
    progress::TransferProgress,
    snapshot::{Database, Instance, Key, KeyKind, KeyValue},
};

use super::{
    report::{DatabaseReport, KeyFailure, KeyOutcome},
    store::Store,
};

pub(crate) async fn read_value<S: Store + ?Sized>(
    store: &mut S,
    key: &str,
    kind: &KeyKind,
) -> Result<KeyValue, KeyFailure> {
    let value = match kind {
        KeyKind::Other(name) => {
            return Err(KeyFailure::new(key, "TYPE", format!("unsupported type {name}")))
        }
        KeyKind::String => store
            .get(key)
            .await
            .map(KeyValue::String)
            .map_err(|e| KeyFailure::new(key, "GET", e))?,
        KeyKind::Hash => store
            .hgetall(key)
            .await
            .map(KeyValue::Hash)
            .map_err(|e| KeyFailure::new(key, "HGETALL", e))?,
        KeyKind::List => {
            let length = store
                .llen(key)
                .await
                .map_err(|e| KeyFailure::new(key, "LLEN", e))?;
            store
                .lrange(key, 0, length)
                .await
                .map(KeyValue::List)
                .map_err(|e| KeyFailure::new(key, "LRANGE", e))?
        }
        KeyKind::Set => store
            .smembers(key)
            .await
            .map(KeyValue::Set)
            .map_err(|e| KeyFailure::new(key, "SMEMBERS", e))?,
        KeyKind::SortedSet => {
            let length = store
                .zcard(key)
                .await
                .map_err(|e| KeyFailure::new(key, "ZCARD", e))?;
            store
                .zrange(key, 0, length)
                .await
                .map(KeyValue::SortedSet)
                .map_err(|e| KeyFailure::new(key, "ZRANGE", e))?
        }
    };
    Ok(value)
}

/// Remaining lifetime of `key`; `None` when it has no expiry.
pub(crate) async fn read_ttl<S: Store + ?Sized>(
    store: &mut S,
    key: &str,
) -> Result<Option<Duration>, KeyFailure> {
    let millis = store
        .pttl(key)
        .await
        .map_err(|e| KeyFailure::new(key, "PTTL", e))?;
    Ok(u64::try_from(millis)
        .ok()
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis))
}

/// Captures one key. Returns `None` for keys the snapshot cannot hold.
pub(crate) async fn capture_key<S: Store + ?Sized>(
    store: &mut S,
    name: &str,
) -> (Option<Key>, KeyOutcome) {
    let type_name = match store.key_type(name).await {
        Ok(type_name) => type_name,
        Err(e) => {
            return (
                None,
                KeyOutcome::Failed(vec![KeyFailure::new(name, "TYPE", e)]),
            )
        }
    };
    let Some(kind) = KeyKind::from_type_name(&type_name) else {
        tracing::debug!(key = name, key_type = %type_name, "skipping key of unsupported type");
        return (None, KeyOutcome::Skipped);
    };

    let mut failures = Vec::new();
    let value = read_value(store, name, &kind)
        .await
        .map_err(|failure| failures.push(failure))
        .ok();
    let ttl = read_ttl(store, name)
        .await
        .map_err(|failure| failures.push(failure))
        .ok()
        .flatten();

    let key = match value {
        Some(value) => Key::new(name, value, ttl),
        None => Key::unread(name, kind, ttl),
    };
    (Some(key), KeyOutcome::from_failures(failures))
}

/// Captures a single database. Selection and enumeration failures are fatal.
///
/// Enumeration is one `SCAN` page sized from the keyspace estimate, so keys
/// beyond `approx_size + 1` in a growing database may be missed.
pub async fn dump_database<S: Store + ?Sized>(
    store: &mut S,
    space: &KeySpace,
    progress: &TransferProgress,
) -> Result<(Database, DatabaseReport)> {
    store
        .select(space.db)
        .await
        .with_context(|| format!("Cannot change database to {}", space.db))?;

    let count = u64::try_from(space.approx_size).unwrap_or(0) + 1;
    let names = store
        .scan_page(SCAN_PATTERN, count)
        .await
        .with_context(|| format!("Cannot scan keys of database {}", space.db))?;

    let mut report = DatabaseReport::new(space.db);
    let mut keys = Vec::with_capacity(names.len());
    for raw_name in names {
        // Snapshot key names are JSON strings, so binary names cannot be carried.
        let outcome = match String::from_utf8(raw_name) {
            Ok(name) => {
                let (key, outcome) = capture_key(store, &name).await;
                keys.extend(key);
                outcome
            }
            Err(e) => KeyOutcome::Failed(vec![KeyFailure::new(
                &String::from_utf8_lossy(e.as_bytes()),
                "SCAN",
                "key name is not valid UTF-8",
            )]),
        };
        report.record(outcome);
        progress.increment();
    }

    let database = Database {
        id: space.db,
        approx_size: space.approx_size,
        keys,
    };
    Ok((database, report))
}

/// Captures every database listed in `spaces`, in order.
///
/// `on_report` sees each database's report as soon as that database is done,
/// so earlier reports are not lost when a later database fails fatally.
pub async fn dump_instance<S, F>(
    store: &mut S,
    spaces: &[KeySpace],
    progress: &TransferProgress,
    mut on_report: F,
) -> Result<(Instance, Vec<DatabaseReport>)>
where
    S: Store + ?Sized,
    F: FnMut(&DatabaseReport),
{
    let mut instance = Instance::default();
    let mut reports = Vec::with_capacity(spaces.len());
    for space in spaces {
        progress.update_stage(&format!("Dumping db{}", space.db));
        let (database, report) = dump_database(store, space, progress).await?;
        on_report(&report);
        instance.databases.push(database);
        reports.push(report);
    }
    Ok((instance, reports))
}
