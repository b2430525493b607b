use crate::transport::{SessionError, SessionErrorKind};

/// Итоговый код ошибки одного запуска. Ровно один на запуск.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ErrorCode {
    #[default]
    None,
    Timeout,
    Auth,
    /// Прочая ошибка с текстом для summary отчёта
    Other(String),
}

impl ErrorCode {
    pub fn timeout_flag(&self) -> u8 {
        matches!(self, ErrorCode::Timeout) as u8
    }

    pub fn auth_flag(&self) -> u8 {
        matches!(self, ErrorCode::Auth) as u8
    }
}

/// Классифицирует сбой сессии в стабильный код ошибки.
///
/// Правила по порядку: таймаут транспорта — Timeout; "не нашли
/// приглашение" на хосте из особого списка — тоже Timeout (часть парка
/// сообщает о таймауте именно так); ошибка аутентификации — Auth;
/// всё остальное — Other с текстом.
pub fn classify(error: &SessionError, host_is_special: bool) -> ErrorCode {
    match error.kind {
        SessionErrorKind::Timeout => ErrorCode::Timeout,
        SessionErrorKind::PromptNotFound if host_is_special => ErrorCode::Timeout,
        SessionErrorKind::Auth => ErrorCode::Auth,
        _ => ErrorCode::Other(error.message.clone()),
    }
}

/// Проверяет, начинается ли имя хоста с одного из особых префиксов
/// (без учёта регистра)
pub fn host_is_special(host: &str, prefixes: &[String]) -> bool {
    let host = host.to_uppercase();
    prefixes
        .iter()
        .any(|prefix| host.starts_with(&prefix.to_uppercase()))
}
