use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::poller::{ErrorCode, PollResult};

const TRAPPER_HEADER: &[u8; 5] = b"ZBXD\x01";

/// Ключ LLD правила на стороне Zabbix
const LLD_KEY: &str = "bfd.session.lld";

/// Запись низкоуровневого обнаружения одной BFD сессии
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    #[serde(rename = "{#BFD.SESSION.ID}")]
    pub session_id: String,
    #[serde(rename = "{#BFD.SESSION.IP}")]
    pub neighbor: String,
    #[serde(rename = "{#BFD.SESSION.OK}")]
    pub session_ok: String,
    #[serde(rename = "{#BFD.SESSION.BAD}")]
    pub session_bad: String,
}

#[derive(Debug, Clone, Serialize)]
struct TrapperItem {
    host: String,
    key: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct TrapperRequest<'a> {
    request: &'static str,
    data: &'a [TrapperItem],
}

/// Ответ trapper сервера
#[derive(Debug, Deserialize)]
pub struct TrapperResponse {
    pub response: String,
    #[serde(default)]
    pub info: String,
}

/// Отправитель данных в Zabbix trapper по бинарному протоколу
/// ZBXD + длина + JSON
pub struct TrapperSender {
    server: String,
    port: u16,
    timeout: Duration,
}

impl TrapperSender {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            server: config.trapper_server(),
            port: config.trapper_port(),
            timeout: config.trapper_timeout(),
        }
    }

    /// Отправляет набор ключ-значение для одного хоста
    pub async fn send_items(&self, host: &str, items: &[(String, String)]) -> Result<TrapperResponse> {
        let data: Vec<TrapperItem> = items
            .iter()
            .map(|(key, value)| TrapperItem {
                host: host.to_string(),
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        self.send(&data).await
    }

    /// Отправляет discovery список: значение ключа — JSON массив записей
    pub async fn send_lld(&self, host: &str, records: &[DiscoveryRecord]) -> Result<TrapperResponse> {
        let value =
            serde_json::to_string(records).context("Не удалось сериализовать LLD данные")?;
        let data = vec![TrapperItem {
            host: host.to_string(),
            key: LLD_KEY.to_string(),
            value,
        }];
        self.send(&data).await
    }

    async fn send(&self, data: &[TrapperItem]) -> Result<TrapperResponse> {
        let payload = serde_json::to_vec(&TrapperRequest {
            request: "sender data",
            data,
        })
        .context("Не удалось сериализовать trapper запрос")?;

        let mut frame = Vec::with_capacity(13 + payload.len());
        frame.extend_from_slice(TRAPPER_HEADER);
        frame.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        frame.extend_from_slice(&payload);

        let exchange = async {
            let mut stream = TcpStream::connect((self.server.as_str(), self.port))
                .await
                .context("Не удалось подключиться к Zabbix trapper")?;
            stream
                .write_all(&frame)
                .await
                .context("Не удалось отправить trapper фрейм")?;

            let mut header = [0u8; 13];
            stream
                .read_exact(&mut header)
                .await
                .context("Не удалось прочитать заголовок ответа trapper")?;
            if &header[..5] != TRAPPER_HEADER {
                bail!("Неожиданный заголовок ответа trapper");
            }
            let mut length = [0u8; 8];
            length.copy_from_slice(&header[5..13]);
            let length = u64::from_le_bytes(length) as usize;

            let mut body = vec![0u8; length];
            stream
                .read_exact(&mut body)
                .await
                .context("Не удалось прочитать тело ответа trapper")?;
            serde_json::from_slice(&body).context("Не удалось распарсить ответ trapper")
        };

        match timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => bail!("Таймаут отправки в Zabbix trapper"),
        }
    }
}

/// Отправляет все три вида данных одного опроса: items с интерфейсами,
/// discovery список и финальные state + summary значения.
/// Сбои отправки логируются и не прерывают завершение процесса.
pub async fn submit(sender: &TrapperSender, host: &str, result: &PollResult) {
    if !result.interfaces.is_empty() {
        let items: Vec<(String, String)> = result
            .interfaces
            .iter()
            .flat_map(|f| {
                [
                    (format!("name[{}]", f.neighbor), f.interface.clone()),
                    (format!("description[{}]", f.neighbor), f.description.clone()),
                ]
            })
            .collect();
        match sender.send_items(host, &items).await {
            Ok(reply) => debug!(info = %reply.info, "Интерфейсы отправлены"),
            Err(e) => warn!(error = %e, "Не удалось отправить данные интерфейсов"),
        }
    }

    match sender.send_lld(host, &result.discovery).await {
        Ok(reply) => debug!(info = %reply.info, "Discovery отправлен"),
        Err(e) => warn!(error = %e, "Не удалось отправить discovery данные"),
    }

    let mut items: Vec<(String, String)> = result
        .state
        .iter()
        .map(|(neighbor, code)| (format!("state[{}]", neighbor), code.to_string()))
        .collect();

    let mut errors = result.errors.clone();
    if let ErrorCode::Other(message) = &result.error {
        errors.push(message.clone());
    }
    items.push(("bfd.script.error".to_string(), errors.join("\n")));
    items.push((
        "bfd.timeout.error".to_string(),
        result.error.timeout_flag().to_string(),
    ));
    items.push((
        "bfd.auth.error".to_string(),
        result.error.auth_flag().to_string(),
    ));

    match sender.send_items(host, &items).await {
        Ok(reply) => debug!(info = %reply.info, "Состояние отправлено"),
        Err(e) => warn!(error = %e, "Не удалось отправить состояние"),
    }
}
