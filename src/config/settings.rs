use serde::{Deserialize, Serialize};

/// Базовые настройки приложения
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Настройки webdis кэша типов устройств
    pub cache: CacheSettings,
    /// Настройки Zabbix trapper
    pub trapper: TrapperSettings,
    /// Настройки подключения к устройству
    pub connection: ConnectionSettings,
    /// Политики классификации ошибок
    pub policy: PolicySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Адрес webdis
    pub ip: String,
    /// Порт webdis
    pub port: u16,
    /// Номер базы redis
    pub db: String,
    /// Префикс ключа, к нему добавляется IP устройства
    pub prefix: String,
    /// TTL закэшированного типа устройства (секунды)
    pub ttl: u64,
    /// Таймаут HTTP запросов к кэшу (секунды)
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapperSettings {
    /// Адрес Zabbix сервера
    pub server: String,
    /// Порт trapper
    pub port: u16,
    /// Таймаут отправки (секунды)
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Таймаут TCP подключения к устройству (секунды)
    pub connect_timeout: u64,
    /// Таймаут ожидания приглашения и вывода команды (секунды)
    pub read_timeout: u64,
    /// Таймаут одной команды целиком (секунды)
    pub command_timeout: u64,
    /// Таймаут автоопределения типа устройства (секунды)
    pub autodetect_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Префиксы имён хостов, для которых "Unable to find prompt"
    /// считается таймаутом, а не прочей ошибкой
    pub special_host_prefixes: Vec<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ip: "192.168.37.218".to_string(),
            port: 7379,
            db: "6".to_string(),
            prefix: "Template_Net_Syslog".to_string(),
            ttl: 14400,
            timeout: 5,
        }
    }
}

impl Default for TrapperSettings {
    fn default() -> Self {
        Self {
            server: "127.0.0.1".to_string(),
            port: 10051,
            timeout: 10,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: 10,
            read_timeout: 15,
            command_timeout: 60,
            autodetect_timeout: 60,
        }
    }
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            special_host_prefixes: vec!["UAK".to_string()],
        }
    }
}
