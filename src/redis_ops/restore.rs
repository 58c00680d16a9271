use anyhow::{Context, Result};
use std::time::Duration;

use crate::{
    progress::TransferProgress,
    snapshot::{Database, Instance, Key, KeyValue},
};

use super::{
    report::{DatabaseReport, KeyFailure, KeyOutcome},
    store::Store,
};

/// PEXPIRE argument for `ttl`, rounded up so short lifetimes are not dropped.
pub(crate) fn expire_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_nanos().div_ceil(1_000_000)).unwrap_or(i64::MAX)
}

async fn write_value<S: Store + ?Sized>(
    store: &mut S,
    key: &str,
    value: &KeyValue,
    failures: &mut Vec<KeyFailure>,
) {
    match value {
        KeyValue::String(value) => {
            if let Err(e) = store.set(key, value).await {
                failures.push(KeyFailure::new(key, "SET", e));
            }
        }
        // Fields already present at the destination win.
        KeyValue::Hash(fields) => {
            for (field, value) in fields {
                if let Err(e) = store.hset_nx(key, field, value).await {
                    failures.push(KeyFailure::new(key, "HSETNX", e));
                }
            }
        }
        // One LPUSH of the reversed items places them at the head in their original order.
        KeyValue::List(items) => {
            if items.is_empty() {
                return;
            }
            let reversed: Vec<String> = items.iter().rev().cloned().collect();
            if let Err(e) = store.lpush(key, &reversed).await {
                failures.push(KeyFailure::new(key, "LPUSH", e));
            }
        }
        KeyValue::Set(members) => {
            if members.is_empty() {
                return;
            }
            if let Err(e) = store.sadd(key, members).await {
                failures.push(KeyFailure::new(key, "SADD", e));
            }
        }
        // Scores were not captured; rank stands in for them.
        KeyValue::SortedSet(members) => {
            if members.is_empty() {
                return;
            }
            let scored: Vec<(f64, String)> = members
                .iter()
                .enumerate()
                .map(|(rank, member)| (rank as f64, member.clone()))
                .collect();
            if let Err(e) = store.zadd(key, &scored).await {
                failures.push(KeyFailure::new(key, "ZADD", e));
            }
        }
    }
}

/// Replays one key. The TTL is applied relative to now, after the write.
pub(crate) async fn restore_key<S: Store + ?Sized>(store: &mut S, key: &Key) -> KeyOutcome {
    let Some(value) = &key.value else {
        return KeyOutcome::Skipped;
    };

    let mut failures = Vec::new();
    write_value(store, &key.name, value, &mut failures).await;

    if let Some(ttl) = key.ttl.filter(|ttl| !ttl.is_zero()) {
        if let Err(e) = store.pexpire(&key.name, expire_millis(ttl)).await {
            failures.push(KeyFailure::new(&key.name, "PEXPIRE", e));
        }
    }

    KeyOutcome::from_failures(failures)
}

/// Replays a single database. Only a selection failure is fatal.
pub async fn restore_database<S: Store + ?Sized>(
    store: &mut S,
    database: &Database,
    progress: &TransferProgress,
) -> Result<DatabaseReport> {
    store
        .select(database.id)
        .await
        .with_context(|| format!("Cannot change database to {}", database.id))?;

    let mut report = DatabaseReport::new(database.id);
    for key in &database.keys {
        report.record(restore_key(store, key).await);
        progress.increment();
    }
    Ok(report)
}

/// Replays every database of `instance`, in file order. `on_report` sees each
/// database's report as soon as it completes, so a later fatal error does not
/// hide the outcome of earlier databases.
pub async fn restore_instance<S, F>(
    store: &mut S,
    instance: &Instance,
    progress: &TransferProgress,
    mut on_report: F,
) -> Result<Vec<DatabaseReport>>
where
    S: Store + ?Sized,
    F: FnMut(&DatabaseReport),
{
    let mut reports = Vec::with_capacity(instance.databases.len());
    for database in &instance.databases {
        progress.update_stage(&format!("Restoring db{}", database.id));
        let report = restore_database(store, database, progress).await?;
        on_report(&report);
        reports.push(report);
    }
    Ok(reports)
}
