use std::env;

/// Server configuration, loaded from environment variables via a single
/// `Config::from_env` constructor.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub app_name: String,
    /// Accepted but unused: the message broker is an external collaborator.
    pub msg_broker: String,
    pub entity_management_tick_minutes: u32,
    pub datapoint_cleaning_tick_minutes: u32,
    /// Directory of per-entity-type YAML `AttrSpec` documents.
    pub attrspec_dir: String,
    pub worker_index: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT").unwrap_or_else(|_| "3100".to_string()).parse()?,
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "dp3".to_string()),
            msg_broker: env::var("MSG_BROKER").unwrap_or_else(|_| "amqp://localhost".to_string()),
            entity_management_tick_minutes: env::var("ENTITY_MANAGEMENT_TICK_RATE")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            datapoint_cleaning_tick_minutes: env::var("DATAPOINT_CLEANING_TICK_RATE")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            attrspec_dir: env::var("ATTRSPEC_DIR").unwrap_or_else(|_| "attrspec".to_string()),
            worker_index: env::var("WORKER_INDEX").unwrap_or_else(|_| "0".to_string()).parse()?,
        })
    }
}
