use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    MySql,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(StoreBackend::MySql),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(DomainError::ConfigurationError(format!(
                "STORE_BACKEND must be 'mysql' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 存储后端
    pub store_backend: StoreBackend,

    /// 数据库连接串（MySQL后端必填）
    pub database_url: Option<String>,

    /// 连接池大小
    pub database_max_connections: u32,

    /// 监听地址
    pub server_host: String,

    /// 监听端口
    pub server_port: u16,

    /// 座位锁等待上限
    pub seat_lock_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取配置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DomainResult<Self> {
        let store_backend = match lookup("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StoreBackend::MySql,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if store_backend == StoreBackend::MySql && database_url.is_none() {
            return Err(DomainError::ConfigurationError(
                "DATABASE_URL must be set for the mysql backend".to_string(),
            ));
        }

        let seat_lock_timeout_secs: u64 = parse_or(&lookup, "SEAT_LOCK_TIMEOUT_SECS", 5)?;
        if seat_lock_timeout_secs == 0 {
            return Err(DomainError::ConfigurationError(
                "SEAT_LOCK_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            store_backend,
            database_url,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            seat_lock_timeout: Duration::from_secs(seat_lock_timeout_secs),
        })
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> DomainResult<T> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            DomainError::ConfigurationError(format!("{} has an invalid value: '{}'", key, raw))
        }),
        None => Ok(default),
    }
}
