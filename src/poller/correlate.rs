use crate::transport::{DeviceSession, SessionError};
use crate::vendor::Vendor;

use super::parser::BfdSession;

/// Интерфейс BFD сессии с человекочитаемым описанием
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceFact {
    pub neighbor: String,
    pub interface: String,
    pub description: String,
}

/// Привязывает описание интерфейса к каждой сессии.
///
/// Стратегия зависит от вендора: IOS отдаёт одну общую таблицу описаний,
/// NX-OS опрашивается по одному интерфейсу за команду.
pub async fn correlate_interfaces(
    vendor: Vendor,
    session: &mut dyn DeviceSession,
    sessions: &[BfdSession],
) -> Result<Vec<InterfaceFact>, SessionError> {
    match vendor {
        Vendor::CiscoIos => correlate_single_table(session, sessions).await,
        Vendor::CiscoNxos => correlate_per_interface(session, sessions).await,
    }
}

/// IOS: одна команда "show interfaces description", дальше ищем строку
/// по префиксу имени интерфейса и берём хвост от колонки Description
async fn correlate_single_table(
    session: &mut dyn DeviceSession,
    sessions: &[BfdSession],
) -> Result<Vec<InterfaceFact>, SessionError> {
    let raw = session.send_command("show interfaces description").await?;
    let facts = sessions
        .iter()
        .map(|s| InterfaceFact {
            neighbor: s.neighbor.clone(),
            interface: s.interface.clone(),
            description: description_from_table(&raw, &s.interface),
        })
        .collect();
    Ok(facts)
}

/// NX-OS: по команде на каждый интерфейс, формат ответа плавает
async fn correlate_per_interface(
    session: &mut dyn DeviceSession,
    sessions: &[BfdSession],
) -> Result<Vec<InterfaceFact>, SessionError> {
    let mut facts = Vec::with_capacity(sessions.len());
    for s in sessions {
        let command = format!("show interface {} description", s.interface);
        let raw = session.send_command(&command).await?;
        facts.push(InterfaceFact {
            neighbor: s.neighbor.clone(),
            interface: s.interface.clone(),
            description: description_from_reply(&raw),
        });
    }
    Ok(facts)
}

/// Вырезает описание интерфейса из общей таблицы. Смещение колонки
/// берётся из позиции слова Description в заголовке; если интерфейс не
/// нашёлся — описание пустое.
fn description_from_table(raw: &str, interface: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let Some(position) = lines.first().and_then(|header| header.find("Description")) else {
        return String::new();
    };
    lines
        .iter()
        .find(|line| line.starts_with(interface))
        .and_then(|line| line.get(position..))
        .map(|tail| tail.trim().to_string())
        .unwrap_or_default()
}

/// Разбирает ответ "show interface X description".
///
/// Бывает две формы: блок с заголовком "Interface" (описание через две
/// строки после заголовка) и блок "Port" строкой ниже (описание ещё на
/// строку дальше). Неизвестная форма — пустое описание, не ошибка.
fn description_from_reply(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    if let Some(header) = lines.get(1).filter(|l| l.starts_with("Interface")) {
        if let Some(position) = header.find("Description") {
            return lines
                .get(3)
                .and_then(|line| line.get(position..))
                .map(|tail| tail.trim().to_string())
                .unwrap_or_default();
        }
    }
    if let Some(header) = lines.get(2).filter(|l| l.starts_with("Port")) {
        if let Some(position) = header.find("Description") {
            return lines
                .get(4)
                .and_then(|line| line.get(position..))
                .map(|tail| tail.trim().to_string())
                .unwrap_or_default();
        }
    }
    String::new()
}
