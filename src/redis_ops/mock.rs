//! In-memory `Store` used by the engine tests.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Entry {
    Str(String),
    Hash(BTreeMap<String, String>),
    List(Vec<String>),
    Set(BTreeSet<String>),
    ZSet(Vec<(f64, String)>),
}

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    pub(crate) databases: BTreeMap<u32, BTreeMap<String, Entry>>,
    pub(crate) ttls: HashMap<(u32, String), i64>,
    /// Write commands in issue order, e.g. `"SET foo bar"`.
    pub(crate) commands: Vec<String>,
    binary_names: BTreeMap<u32, Vec<Vec<u8>>>,
    failing: HashSet<(String, String)>,
    failing_selects: HashSet<u32>,
    fail_scan: bool,
    selected: u32,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, db: u32, key: &str, entry: Entry) {
        self.databases
            .entry(db)
            .or_default()
            .insert(key.to_string(), entry);
    }

    /// Adds a key name that SCAN returns but that is not valid UTF-8.
    pub(crate) fn insert_binary_name(&mut self, db: u32, name: Vec<u8>) {
        self.binary_names.entry(db).or_default().push(name);
    }

    pub(crate) fn expire_in(&mut self, db: u32, key: &str, millis: i64) {
        self.ttls.insert((db, key.to_string()), millis);
    }

    pub(crate) fn entry(&self, db: u32, key: &str) -> Option<&Entry> {
        self.databases.get(&db).and_then(|keys| keys.get(key))
    }

    /// Makes `command` (upper case, e.g. `"HGETALL"`) fail for `key`.
    pub(crate) fn fail(&mut self, command: &str, key: &str) {
        self.failing.insert((command.to_string(), key.to_string()));
    }

    pub(crate) fn fail_select(&mut self, db: u32) {
        self.failing_selects.insert(db);
    }

    pub(crate) fn fail_scan(&mut self) {
        self.fail_scan = true;
    }

    pub(crate) fn count_commands(&self, prefix: &str) -> usize {
        self.commands
            .iter()
            .filter(|command| command.starts_with(prefix))
            .count()
    }

    fn check(&self, command: &str, key: &str) -> Result<()> {
        if self.failing.contains(&(command.to_string(), key.to_string())) {
            bail!("{command} {key}: injected failure");
        }
        Ok(())
    }

    fn current(&mut self) -> &mut BTreeMap<String, Entry> {
        self.databases.entry(self.selected).or_default()
    }

    fn lookup(&self, key: &str) -> Option<&Entry> {
        self.entry(self.selected, key)
    }
}

fn wrong_type(key: &str) -> anyhow::Error {
    anyhow!("WRONGTYPE {key}")
}

fn slice(items: &[String], start: i64, stop: i64) -> Vec<String> {
    let len = items.len() as i64;
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return Vec::new();
    }
    items[start as usize..=stop as usize].to_vec()
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&mut self, db: u32) -> Result<()> {
        if self.failing_selects.contains(&db) {
            bail!("ERR DB index is out of range");
        }
        self.selected = db;
        Ok(())
    }

    async fn scan_page(&mut self, pattern: &str, count: u64) -> Result<Vec<Vec<u8>>> {
        if self.fail_scan {
            bail!("SCAN: injected failure");
        }
        assert_eq!(pattern, "*");
        let binary = self
            .binary_names
            .get(&self.selected)
            .cloned()
            .unwrap_or_default();
        Ok(self
            .current()
            .keys()
            .map(|name| name.clone().into_bytes())
            .chain(binary)
            .take(count as usize)
            .collect())
    }

    async fn key_type(&mut self, key: &str) -> Result<String> {
        self.check("TYPE", key)?;
        let name = match self.lookup(key) {
            None => "none",
            Some(Entry::Str(_)) => "string",
            Some(Entry::Hash(_)) => "hash",
            Some(Entry::List(_)) => "list",
            Some(Entry::Set(_)) => "set",
            Some(Entry::ZSet(_)) => "zset",
        };
        Ok(name.to_string())
    }

    async fn pttl(&mut self, key: &str) -> Result<i64> {
        self.check("PTTL", key)?;
        if self.lookup(key).is_none() {
            return Ok(-2);
        }
        Ok(*self.ttls.get(&(self.selected, key.to_string())).unwrap_or(&-1))
    }

    async fn get(&mut self, key: &str) -> Result<String> {
        self.check("GET", key)?;
        match self.lookup(key) {
            Some(Entry::Str(value)) => Ok(value.clone()),
            _ => Err(wrong_type(key)),
        }
    }

    async fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, String>> {
        self.check("HGETALL", key)?;
        match self.lookup(key) {
            Some(Entry::Hash(fields)) => Ok(fields.clone()),
            _ => Err(wrong_type(key)),
        }
    }

    async fn llen(&mut self, key: &str) -> Result<i64> {
        self.check("LLEN", key)?;
        match self.lookup(key) {
            Some(Entry::List(items)) => Ok(items.len() as i64),
            _ => Err(wrong_type(key)),
        }
    }

    async fn lrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.check("LRANGE", key)?;
        match self.lookup(key) {
            Some(Entry::List(items)) => Ok(slice(items, start, stop)),
            _ => Err(wrong_type(key)),
        }
    }

    async fn smembers(&mut self, key: &str) -> Result<Vec<String>> {
        self.check("SMEMBERS", key)?;
        match self.lookup(key) {
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            _ => Err(wrong_type(key)),
        }
    }

    async fn zcard(&mut self, key: &str) -> Result<i64> {
        self.check("ZCARD", key)?;
        match self.lookup(key) {
            Some(Entry::ZSet(members)) => Ok(members.len() as i64),
            _ => Err(wrong_type(key)),
        }
    }

    async fn zrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.check("ZRANGE", key)?;
        match self.lookup(key) {
            Some(Entry::ZSet(members)) => {
                let mut ranked = members.clone();
                ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
                let names: Vec<String> = ranked.into_iter().map(|(_, member)| member).collect();
                Ok(slice(&names, start, stop))
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.check("SET", key)?;
        self.commands.push(format!("SET {key} {value}"));
        self.current()
            .insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(())
    }

    async fn hset_nx(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.check("HSETNX", key)?;
        self.commands.push(format!("HSETNX {key} {field} {value}"));
        let entry = self
            .current()
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()));
        let Entry::Hash(fields) = entry else {
            return Err(wrong_type(key));
        };
        if fields.contains_key(field) {
            return Ok(false);
        }
        fields.insert(field.to_string(), value.to_string());
        Ok(true)
    }

    async fn lpush(&mut self, key: &str, items: &[String]) -> Result<()> {
        self.check("LPUSH", key)?;
        self.commands.push(format!("LPUSH {key} {}", items.join(" ")));
        let entry = self
            .current()
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(Vec::new()));
        let Entry::List(list) = entry else {
            return Err(wrong_type(key));
        };
        for item in items {
            list.insert(0, item.clone());
        }
        Ok(())
    }

    async fn sadd(&mut self, key: &str, members: &[String]) -> Result<()> {
        self.check("SADD", key)?;
        self.commands.push(format!("SADD {key} {}", members.join(" ")));
        let entry = self
            .current()
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()));
        let Entry::Set(set) = entry else {
            return Err(wrong_type(key));
        };
        set.extend(members.iter().cloned());
        Ok(())
    }

    async fn zadd(&mut self, key: &str, members: &[(f64, String)]) -> Result<()> {
        self.check("ZADD", key)?;
        let args: Vec<String> = members
            .iter()
            .map(|(score, member)| format!("{score} {member}"))
            .collect();
        self.commands.push(format!("ZADD {key} {}", args.join(" ")));
        let entry = self
            .current()
            .entry(key.to_string())
            .or_insert_with(|| Entry::ZSet(Vec::new()));
        let Entry::ZSet(zset) = entry else {
            return Err(wrong_type(key));
        };
        for (score, member) in members {
            zset.retain(|(_, existing)| existing != member);
            zset.push((*score, member.clone()));
        }
        Ok(())
    }

    async fn pexpire(&mut self, key: &str, millis: i64) -> Result<()> {
        self.check("PEXPIRE", key)?;
        self.commands.push(format!("PEXPIRE {key} {millis}"));
        self.ttls.insert((self.selected, key.to_string()), millis);
        Ok(())
    }
}
