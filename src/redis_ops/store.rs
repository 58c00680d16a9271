use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::BTreeMap;

/// The commands the dump and restore paths issue against a live server.
///
/// Every call targets the database chosen by the most recent `select`.
#[async_trait]
pub trait Store: Send {
    async fn select(&mut self, db: u32) -> Result<()>;
    /// A single `SCAN 0 MATCH pattern COUNT count` round; the cursor is not followed.
    /// Names come back as raw bytes since key names are binary-safe.
    async fn scan_page(&mut self, pattern: &str, count: u64) -> Result<Vec<Vec<u8>>>;
    async fn key_type(&mut self, key: &str) -> Result<String>;
    /// Remaining lifetime in milliseconds; negative when the key has no expiry.
    async fn pttl(&mut self, key: &str) -> Result<i64>;

    async fn get(&mut self, key: &str) -> Result<String>;
    async fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, String>>;
    async fn llen(&mut self, key: &str) -> Result<i64>;
    async fn lrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;
    async fn smembers(&mut self, key: &str) -> Result<Vec<String>>;
    async fn zcard(&mut self, key: &str) -> Result<i64>;
    async fn zrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;

    async fn set(&mut self, key: &str, value: &str) -> Result<()>;
    async fn hset_nx(&mut self, key: &str, field: &str, value: &str) -> Result<bool>;
    async fn lpush(&mut self, key: &str, items: &[String]) -> Result<()>;
    async fn sadd(&mut self, key: &str, members: &[String]) -> Result<()>;
    async fn zadd(&mut self, key: &str, members: &[(f64, String)]) -> Result<()>;
    async fn pexpire(&mut self, key: &str, millis: i64) -> Result<()>;
}

/// Replies are read as bytes and converted here, so a binary value fails its
/// own key with a clear error instead of a generic decode error.
fn utf8(key: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| anyhow!("value of {key:?} is not valid UTF-8"))
}

fn utf8_all(key: &str, items: Vec<Vec<u8>>) -> Result<Vec<String>> {
    items.into_iter().map(|item| utf8(key, item)).collect()
}

#[async_trait]
impl Store for redis::aio::MultiplexedConnection {
    async fn select(&mut self, db: u32) -> Result<()> {
        let _: () = redis::cmd("SELECT").arg(db).query_async(self).await?;
        Ok(())
    }

    async fn scan_page(&mut self, pattern: &str, count: u64) -> Result<Vec<Vec<u8>>> {
        let (_cursor, keys): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
            .arg(0)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(self)
            .await?;
        Ok(keys)
    }

    async fn key_type(&mut self, key: &str) -> Result<String> {
        Ok(redis::cmd("TYPE").arg(key).query_async(self).await?)
    }

    async fn pttl(&mut self, key: &str) -> Result<i64> {
        Ok(AsyncCommands::pttl(self, key).await?)
    }

    async fn get(&mut self, key: &str) -> Result<String> {
        let value: Vec<u8> = AsyncCommands::get(self, key).await?;
        utf8(key, value)
    }

    async fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, String>> {
        let fields: BTreeMap<Vec<u8>, Vec<u8>> = AsyncCommands::hgetall(self, key).await?;
        fields
            .into_iter()
            .map(|(field, value)| Ok((utf8(key, field)?, utf8(key, value)?)))
            .collect()
    }

    async fn llen(&mut self, key: &str) -> Result<i64> {
        Ok(AsyncCommands::llen(self, key).await?)
    }

    async fn lrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let items: Vec<Vec<u8>> = redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(self)
            .await?;
        utf8_all(key, items)
    }

    async fn smembers(&mut self, key: &str) -> Result<Vec<String>> {
        let members: Vec<Vec<u8>> = AsyncCommands::smembers(self, key).await?;
        utf8_all(key, members)
    }

    async fn zcard(&mut self, key: &str) -> Result<i64> {
        Ok(AsyncCommands::zcard(self, key).await?)
    }

    async fn zrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let members: Vec<Vec<u8>> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(self)
            .await?;
        utf8_all(key, members)
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let _: () = AsyncCommands::set(self, key, value).await?;
        Ok(())
    }

    async fn hset_nx(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        Ok(AsyncCommands::hset_nx(self, key, field, value).await?)
    }

    async fn lpush(&mut self, key: &str, items: &[String]) -> Result<()> {
        let _: () = redis::cmd("LPUSH").arg(key).arg(items).query_async(self).await?;
        Ok(())
    }

    async fn sadd(&mut self, key: &str, members: &[String]) -> Result<()> {
        let _: () = redis::cmd("SADD").arg(key).arg(members).query_async(self).await?;
        Ok(())
    }

    async fn zadd(&mut self, key: &str, members: &[(f64, String)]) -> Result<()> {
        let _: () = AsyncCommands::zadd_multiple(self, key, members).await?;
        Ok(())
    }

    async fn pexpire(&mut self, key: &str, millis: i64) -> Result<()> {
        let _: () = AsyncCommands::pexpire(self, key, millis).await?;
        Ok(())
    }
}
