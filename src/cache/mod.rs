use anyhow::{Context, Result};
use tracing::debug;

use crate::config::AppConfig;

/// Кэш типов устройств поверх webdis (GET/SETEX по HTTP).
///
/// Кэш строго вспомогательный: корректность опроса от него не зависит.
/// Ошибка `get` отдаётся наверх и трактуется резолвером как промах,
/// ошибка `set` просто логируется.
pub struct DeviceTypeCache {
    client: reqwest::Client,
    base_url: String,
    prefix: String,
}

impl DeviceTypeCache {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.cache_timeout())
            .build()
            .context("Не удалось создать HTTP клиент для кэша")?;
        Ok(Self {
            client,
            base_url: config.cache_base_url(),
            prefix: config.cache_key_prefix(),
        })
    }

    fn key(&self, ip: &str) -> String {
        format!("{}_{}", self.prefix, ip)
    }

    /// Читает закэшированный тип устройства. Ok(None) — промах.
    pub async fn get(&self, ip: &str) -> Result<Option<String>> {
        let url = format!("{}/GET/{}", self.base_url, self.key(ip));
        let reply: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await
            .context("Запрос GET к webdis не удался")?
            .json()
            .await
            .context("Не удалось распарсить ответ webdis")?;

        match reply.get("GET") {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(Some(s.clone())),
            _ => Ok(None),
        }
    }

    /// Пишет тип устройства с TTL. Запись best-effort: сбой не влияет
    /// на результат опроса.
    pub async fn set(&self, ip: &str, device_type: &str, ttl: u64) {
        let url = format!(
            "{}/SETEX/{}/{}/{}",
            self.base_url,
            self.key(ip),
            ttl,
            device_type
        );
        if let Err(e) = self.client.get(&url).send().await {
            debug!(ip, error = %e, "Не удалось записать тип устройства в кэш");
        }
    }
}
