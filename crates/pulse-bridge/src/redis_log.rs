//! Redis Streams event log.
//!
//! Upstream topics are consumed with `XREADGROUP` through a shared
//! consumer group; downstream records are `XADD`ed to per-partition
//! streams. The consumer owns a dedicated connection so its blocking
//! reads never stall publish traffic.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::{info, warn};

use pulse_core::config::event_log::EventLogConfig;
use pulse_core::error::{AppError, ErrorKind};
use pulse_core::result::AppResult;
use pulse_core::traits::event_log::{EventLogConsumer, EventLogProducer, LogEntry};

/// Redis Streams producer/consumer.
#[derive(Debug, Clone)]
pub struct RedisEventLog {
    /// Connection for XADD/XACK traffic.
    producer_conn: ConnectionManager,
    /// Dedicated connection for blocking XREADGROUP polls.
    consumer_conn: ConnectionManager,
    /// Stream and group settings.
    config: EventLogConfig,
    /// Consumer name within the group; the node id.
    consumer_name: String,
}

impl RedisEventLog {
    /// Connect and ensure the consumer groups exist. Failure here is a
    /// startup error; the process must not come up without its log.
    pub async fn connect(config: &EventLogConfig, consumer_name: &str) -> AppResult<Self> {
        info!(url = %config.url, group = %config.group, "Connecting to event log");

        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::EventLog, "Failed to create Redis client", e)
        })?;

        let producer_conn = ConnectionManager::new(client.clone()).await.map_err(|e| {
            AppError::with_source(ErrorKind::EventLog, "Failed to connect to event log", e)
        })?;
        let consumer_conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::with_source(ErrorKind::EventLog, "Failed to connect to event log", e)
        })?;

        let log = Self {
            producer_conn,
            consumer_conn,
            config: config.clone(),
            consumer_name: consumer_name.to_string(),
        };
        log.ensure_groups().await?;
        info!("Event log connected");
        Ok(log)
    }

    /// Create the consumer group on every upstream stream, tolerating
    /// groups that already exist.
    async fn ensure_groups(&self) -> AppResult<()> {
        let mut conn = self.producer_conn.clone();
        for stream in &self.config.consume_streams {
            let result = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(stream)
                .arg(&self.config.group)
                .arg("$")
                .arg("MKSTREAM")
                .query_async::<()>(&mut conn)
                .await;

            match result {
                Ok(()) => info!(stream, group = %self.config.group, "Created consumer group"),
                Err(e) if e.to_string().contains("BUSYGROUP") => {}
                Err(e) => {
                    return Err(AppError::with_source(
                        ErrorKind::EventLog,
                        format!("Failed to create consumer group on {stream}"),
                        e,
                    ));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventLogProducer for RedisEventLog {
    async fn append(&self, stream: &str, payload: &str) -> AppResult<()> {
        let mut conn = self.producer_conn.clone();
        redis::cmd("XADD")
            .arg(stream)
            .arg("*")
            .arg("payload")
            .arg(payload)
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::EventLog, format!("XADD to {stream} failed"), e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl EventLogConsumer for RedisEventLog {
    async fn read_batch(&self) -> AppResult<Vec<LogEntry>> {
        let keys = &self.config.consume_streams;
        let ids: Vec<&str> = keys.iter().map(|_| ">").collect();
        let options = StreamReadOptions::default()
            .group(&self.config.group, &self.consumer_name)
            .count(self.config.batch_size)
            .block(self.config.block_ms as usize);

        let mut conn = self.consumer_conn.clone();
        let reply: StreamReadReply = conn
            .xread_options(keys, &ids, &options)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::EventLog, "XREADGROUP failed", e)
            })?;

        let mut entries = Vec::new();
        for key in reply.keys {
            for id in key.ids {
                let Some(value) = id.map.get("payload") else {
                    warn!(stream = %key.key, entry_id = %id.id, "Entry without payload field");
                    continue;
                };
                match redis::from_redis_value::<String>(value.clone()) {
                    Ok(payload) => entries.push(LogEntry {
                        stream: key.key.clone(),
                        entry_id: id.id.clone(),
                        payload,
                    }),
                    Err(e) => {
                        warn!(stream = %key.key, entry_id = %id.id, error = %e, "Unreadable payload")
                    }
                }
            }
        }
        Ok(entries)
    }

    async fn ack(&self, stream: &str, entry_id: &str) -> AppResult<()> {
        let mut conn = self.producer_conn.clone();
        redis::cmd("XACK")
            .arg(stream)
            .arg(&self.config.group)
            .arg(entry_id)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::EventLog, format!("XACK on {stream} failed"), e)
            })?;
        Ok(())
    }
}
