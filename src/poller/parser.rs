use crate::vendor::VendorSchema;

/// Одна BFD сессия из таблицы соседей. После разбора не меняется.
#[derive(Debug, Clone, PartialEq)]
pub struct BfdSession {
    /// Адрес соседа
    pub neighbor: String,
    /// Локальный дискриминатор (часть до '/')
    pub session_id: String,
    /// Сырой токен состояния, как его напечатало устройство
    pub raw_state: String,
    /// Числовой код состояния: up_code схемы или 0
    pub state_code: i64,
    /// Локальный интерфейс сессии
    pub interface: String,
}

/// Результат разбора таблицы сессий
#[derive(Debug, Clone, Default)]
pub struct ParsedTable {
    pub sessions: Vec<BfdSession>,
    /// Нашлась ли строка-заголовок. Пустая таблица на устройстве —
    /// легитимный исход, а не ошибка.
    pub found: bool,
}

/// Разбирает сырой вывод вендорской команды в упорядоченный список сессий.
///
/// Заголовок — первая строка, чей первый токен равен `first_word` схемы;
/// данные — все непустые строки строго после него. Строки, в которых не
/// хватает колонок, пропускаются: разбор никогда не паникует.
pub fn parse_session_table(raw: &str, schema: &VendorSchema) -> ParsedTable {
    let lines: Vec<&str> = raw.lines().collect();
    let header = lines
        .iter()
        .position(|line| line.split_whitespace().next() == Some(schema.first_word));
    let Some(header) = header else {
        return ParsedTable::default();
    };

    let mut sessions = Vec::new();
    for line in &lines[header + 1..] {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (Some(neighbor), Some(session_id), Some(state), Some(interface)) = (
            fields.get(schema.neighbor),
            fields.get(schema.session_id),
            fields.get(schema.state),
            fields.get(schema.interface),
        ) else {
            continue;
        };

        // дискриминаторы приходят парой local/remote, берём локальный
        let session_id = session_id.split('/').next().unwrap_or("").to_string();
        // неизвестный токен состояния — это "down", а не ошибка
        let state_code = if *state == schema.up_token {
            schema.up_code
        } else {
            0
        };

        sessions.push(BfdSession {
            neighbor: neighbor.to_string(),
            session_id,
            raw_state: state.to_string(),
            state_code,
            interface: interface.to_string(),
        });
    }

    ParsedTable {
        sessions,
        found: true,
    }
}
