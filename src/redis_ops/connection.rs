use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;

use crate::config::{ConnectionConfig, CONNECTION_TIMEOUT};

pub(crate) fn connection_info(config: &ConnectionConfig) -> redis::ConnectionInfo {
    redis::ConnectionInfo {
        addr: redis::ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: redis::RedisConnectionInfo {
            password: config.password.clone(),
            ..Default::default()
        },
    }
}

fn connection_config() -> redis::AsyncConnectionConfig {
    redis::AsyncConnectionConfig::new()
        .set_connection_timeout(CONNECTION_TIMEOUT)
        .set_response_timeout(CONNECTION_TIMEOUT)
}

/// Opens the single connection used for the whole run and checks it with PING.
pub(crate) async fn connect_redis(config: &ConnectionConfig) -> Result<MultiplexedConnection> {
    let client = redis::Client::open(connection_info(config))
        .context("Invalid connection settings")?;
    let mut connection = client
        .get_multiplexed_async_connection_with_config(&connection_config())
        .await
        .with_context(|| {
            format!(
                "Cannot connect to the server at {}:{}",
                config.host, config.port
            )
        })?;

    let _: String = redis::cmd("PING")
        .query_async(&mut connection)
        .await
        .context("Cannot connect to the server")?;

    Ok(connection)
}

pub(crate) async fn keyspace_summary(connection: &mut MultiplexedConnection) -> Result<String> {
    redis::cmd("INFO")
        .arg("keyspace")
        .query_async(connection)
        .await
        .context("Cannot get keyspace info")
}
