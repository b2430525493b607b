use async_trait::async_trait;
use thiserror::Error;

pub mod ssh;

pub use ssh::SshTransport;

/// Вид сбоя удалённой сессии. Классификатор ошибок работает по этому
/// полю, а не по конкретным типам транспортной библиотеки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// Таймаут подключения или ожидания ответа
    Timeout,
    /// Ошибка аутентификации
    Auth,
    /// Не удалось дождаться командного приглашения
    PromptNotFound,
    /// Сбой установления соединения
    Connect,
    /// Ошибка ввода-вывода в уже открытой сессии
    Io,
    /// Всё остальное
    Other,
}

/// Структурированная ошибка удалённой сессии: вид + текст
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Timeout, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Auth, message)
    }

    pub fn prompt_not_found(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::PromptNotFound, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Io, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Other, message)
    }
}

/// Параметры подключения к устройству
#[derive(Debug, Clone)]
pub struct Target {
    pub ip: String,
    pub username: String,
    pub password: String,
}

/// Открытая командная сессия: отправить команду, получить текст
#[async_trait]
pub trait DeviceSession: Send {
    async fn send_command(&mut self, command: &str) -> Result<String, SessionError>;
}

/// Внешний транспорт до устройства. Единственная точка, где появляется
/// реальный SSH; всё остальное тестируется на моке.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Пытается определить тип устройства. Ok(None) — достучались, но не
    /// опознали; это не ошибка.
    async fn autodetect(&self, target: &Target) -> Result<Option<String>, SessionError>;

    /// Открывает командную сессию под известный тип устройства
    async fn open(
        &self,
        target: &Target,
        device_type: &str,
    ) -> Result<Box<dyn DeviceSession>, SessionError>;
}
