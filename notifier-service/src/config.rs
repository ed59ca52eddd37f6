use dotenvy::dotenv;
use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    pub group: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub kafka: KafkaConfig,
    /// Capacity of each connection's outbound queue.
    pub queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let port = env::var("NOTIFIER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8002);
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let kafka = KafkaConfig {
            brokers: env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".into()),
            topic: env::var("KAFKA_TOPIC").unwrap_or_else(|_| "notifications".into()),
            group: env::var("KAFKA_GROUP").unwrap_or_else(|_| "notifier".into()),
        };
        let queue_capacity = env::var("WS_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64);
        if queue_capacity == 0 {
            return Err(AppError::Config(
                "WS_QUEUE_CAPACITY must be greater than zero".into(),
            ));
        }

        Ok(Self {
            port,
            redis_url,
            kafka,
            queue_capacity,
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            port: 0,
            redis_url: "redis://127.0.0.1:6379".into(),
            kafka: KafkaConfig {
                brokers: "localhost:9092".into(),
                topic: "notifications".into(),
                group: "notifier-test".into(),
            },
            queue_capacity: 8,
        }
    }
}
