use tokio::time::timeout;
use tracing::{debug, warn};

use crate::cache::DeviceTypeCache;
use crate::config::AppConfig;
use crate::report::DiscoveryRecord;
use crate::transport::{DeviceSession, DeviceTransport, SessionError, Target};
use crate::vendor::Vendor;

pub mod classify;
pub mod correlate;
pub mod parser;

pub use classify::{classify, host_is_special, ErrorCode};
pub use correlate::InterfaceFact;
pub use parser::{parse_session_table, BfdSession, ParsedTable};

/// Профиль устройства в рамках одного опроса
#[derive(Debug, Clone, Default)]
pub struct DeviceProfile {
    pub ip: String,
    /// Идентификатор типа устройства; None до и при неудачном разрешении
    pub device_type: Option<String>,
    pub cache_hit: bool,
}

/// Итог одного опроса устройства. Потребляется отправкой в Zabbix целиком.
#[derive(Debug, Default)]
pub struct PollResult {
    /// Discovery записи для Zabbix LLD, в порядке строк таблицы
    pub discovery: Vec<DiscoveryRecord>,
    /// Сосед -> числовой код состояния
    pub state: Vec<(String, i64)>,
    /// Интерфейсы сессий с описаниями
    pub interfaces: Vec<InterfaceFact>,
    /// Нашлась ли таблица сессий в выводе команды
    pub found: bool,
    /// Код ошибки запуска
    pub error: ErrorCode,
    /// Нефатальные ошибки для bfd.script.error
    pub errors: Vec<String>,
}

/// Оркестратор одного запуска: разрешение типа устройства, опрос,
/// разбор, корреляция. Любой сбой транспорта превращается в ErrorCode,
/// наружу не выходит ни одной паники и ни одного Err.
pub struct Poller<'a> {
    config: &'a AppConfig,
    /// Кэш опционален: если его не удалось даже инициализировать,
    /// опрос всё равно состоится
    cache: Option<&'a DeviceTypeCache>,
    transport: &'a dyn DeviceTransport,
}

impl<'a> Poller<'a> {
    pub fn new(
        config: &'a AppConfig,
        cache: Option<&'a DeviceTypeCache>,
        transport: &'a dyn DeviceTransport,
    ) -> Self {
        Self {
            config,
            cache,
            transport,
        }
    }

    /// Полный цикл опроса устройства
    pub async fn poll(&self, target: &Target, host: &str) -> PollResult {
        let mut result = PollResult::default();
        let special = host_is_special(host, &self.config.settings.policy.special_host_prefixes);

        let (profile, code) = self.resolve_device_type(target, special, &mut result.errors).await;
        result.error = code;

        // неразрешённый и неизвестный реестру тип ведут себя одинаково:
        // пустое discovery, команды не выполняются
        let Some(vendor) = profile.device_type.as_deref().and_then(Vendor::from_name) else {
            if let Some(unknown) = profile.device_type {
                debug!(device_type = %unknown, "Тип устройства не поддерживается");
            }
            return result;
        };
        debug!(
            ip = %profile.ip,
            device_type = vendor.name(),
            cache_hit = profile.cache_hit,
            "Тип устройства разрешён"
        );

        let mut session = match self.open_session(vendor, target).await {
            Ok(session) => session,
            Err(e) => {
                warn!(ip = %target.ip, error = %e, "Не удалось открыть сессию");
                result.error = classify(&e, special);
                return result;
            }
        };

        let schema = vendor.schema();
        let raw = match timeout(
            self.config.command_timeout(),
            session.send_command(schema.command),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(ip = %target.ip, error = %e, "Команда опроса BFD не удалась");
                result.error = classify(&e, special);
                return result;
            }
            Err(_) => {
                result.error = ErrorCode::Timeout;
                return result;
            }
        };

        let table = parse_session_table(&raw, schema);
        result.found = table.found;
        if !table.found {
            debug!(ip = %target.ip, "Таблица BFD соседей не найдена в выводе");
            return result;
        }

        result.state = table
            .sessions
            .iter()
            .map(|s| (s.neighbor.clone(), s.state_code))
            .collect();
        result.discovery = table
            .sessions
            .iter()
            .map(|s| DiscoveryRecord {
                session_id: s.session_id.clone(),
                neighbor: s.neighbor.clone(),
                session_ok: schema.session_ok.to_string(),
                session_bad: schema.session_bad.to_string(),
            })
            .collect();

        // сбой корреляции не отменяет уже разобранные discovery и state:
        // пустой LLD список снял бы с мониторинга живые сессии
        match correlate::correlate_interfaces(vendor, session.as_mut(), &table.sessions).await {
            Ok(interfaces) => result.interfaces = interfaces,
            Err(e) => {
                warn!(ip = %target.ip, error = %e, "Корреляция описаний интерфейсов не удалась");
                result.error = classify(&e, special);
            }
        }

        result
    }

    /// Разрешает тип устройства: кэш, при промахе — автоопределение с
    /// записью результата обратно в кэш
    pub async fn resolve_device_type(
        &self,
        target: &Target,
        host_is_special: bool,
        errors: &mut Vec<String>,
    ) -> (DeviceProfile, ErrorCode) {
        let mut profile = DeviceProfile {
            ip: target.ip.clone(),
            ..Default::default()
        };

        let cached = match self.cache {
            Some(cache) => cache.get(&target.ip).await,
            None => Err(anyhow::anyhow!("Кэш не инициализирован")),
        };
        match cached {
            Ok(Some(cached)) => {
                profile.device_type = Some(cached);
                profile.cache_hit = true;
                return (profile, ErrorCode::None);
            }
            Ok(None) => {}
            Err(e) => {
                // недоступный кэш — это промах, а не провал опроса
                debug!(error = %e, "Кэш типов устройств недоступен");
                errors.push("Сервер REDIS недоступен.".to_string());
            }
        }

        let detected = timeout(
            self.config.autodetect_timeout(),
            self.transport.autodetect(target),
        )
        .await;

        match detected {
            Ok(Ok(Some(device_type))) => {
                if let Some(cache) = self.cache {
                    cache
                        .set(&target.ip, &device_type, self.config.cache_ttl())
                        .await;
                }
                profile.device_type = Some(device_type);
                (profile, ErrorCode::None)
            }
            Ok(Ok(None)) => {
                debug!(ip = %target.ip, "Автоопределение не опознало устройство");
                (profile, ErrorCode::None)
            }
            Ok(Err(e)) => (profile, classify(&e, host_is_special)),
            Err(_) => (profile, ErrorCode::Timeout),
        }
    }

    async fn open_session(
        &self,
        vendor: Vendor,
        target: &Target,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        timeout(
            self.config.command_timeout(),
            self.transport.open(target, vendor.name()),
        )
        .await
        .map_err(|_| SessionError::timeout("Таймаут открытия сессии"))?
    }
}
