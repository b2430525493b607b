use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub mod settings;

pub use settings::{CacheSettings, ConnectionSettings, PolicySettings, Settings, TrapperSettings};

/// Главная конфигурация приложения
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Базовые настройки
    pub settings: Settings,
}

impl AppConfig {
    /// Загружает конфигурацию из YAML файла, указанного в BFD_LLD_CONFIG,
    /// иначе использует значения по умолчанию
    pub fn load() -> Result<Self> {
        match env::var("BFD_LLD_CONFIG") {
            Ok(path) => {
                let content = std::fs::read_to_string(&path)
                    .context(format!("Не удалось прочитать файл: {}", path))?;
                serde_yml::from_str(&content).context("Не удалось распарсить YAML")
            }
            Err(_) => Ok(Self::default()),
        }
    }

    /// Получает адрес Zabbix сервера из переменной окружения или из настроек
    pub fn trapper_server(&self) -> String {
        env::var("BFD_TRAPPER_SERVER").unwrap_or_else(|_| self.settings.trapper.server.clone())
    }

    /// Получает порт trapper из переменной окружения или из настроек
    pub fn trapper_port(&self) -> u16 {
        env::var("BFD_TRAPPER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.settings.trapper.port)
    }

    /// Базовый URL webdis вида http://ip:port/db
    pub fn cache_base_url(&self) -> String {
        let ip = env::var("BFD_CACHE_IP").unwrap_or_else(|_| self.settings.cache.ip.clone());
        let port = env::var("BFD_CACHE_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(self.settings.cache.port);
        format!("http://{}:{}/{}", ip, port, self.settings.cache.db)
    }

    pub fn cache_key_prefix(&self) -> String {
        self.settings.cache.prefix.clone()
    }

    pub fn cache_ttl(&self) -> u64 {
        self.settings.cache.ttl
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.cache.timeout)
    }

    pub fn trapper_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.trapper.timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.connection.connect_timeout)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.connection.read_timeout)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.connection.command_timeout)
    }

    pub fn autodetect_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.connection.autodetect_timeout)
    }

    pub fn debug_config(&self) {
        tracing::debug!(
            cache = %self.cache_base_url(),
            trapper = %format!("{}:{}", self.trapper_server(), self.trapper_port()),
            ttl = self.cache_ttl(),
            "Конфигурация загружена"
        );
    }
}
