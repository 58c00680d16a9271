use regex::Regex;
use std::sync::OnceLock;

/// One `db<N>:keys=<K>,expires=<E>,avg_ttl=<T>` entry of an `INFO keyspace` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpace {
    pub db: u32,
    pub approx_size: i64,
    pub expires: i64,
    pub avg_ttl_millis: i64,
}

fn keyspace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"db([0-9]+):keys=([0-9]+),expires=([0-9]+),avg_ttl=([0-9]+)")
            .expect("keyspace pattern is a valid regex")
    })
}

/// Extracts every keyspace entry from `summary`, in the order they appear.
///
/// Text that does not match the entry format is ignored, as are entries whose
/// numbers overflow. Duplicate or out-of-order database ids are returned as-is.
pub fn parse_keyspaces(summary: &str) -> Vec<KeySpace> {
    keyspace_pattern()
        .captures_iter(summary)
        .filter_map(|caps| {
            Some(KeySpace {
                db: caps[1].parse().ok()?,
                approx_size: caps[2].parse().ok()?,
                expires: caps[3].parse().ok()?,
                avg_ttl_millis: caps[4].parse().ok()?,
            })
        })
        .collect()
}
