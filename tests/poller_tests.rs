//! Сквозные сценарии опроса на мок-транспорте и мини-webdis

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use bfd_lld::cache::DeviceTypeCache;
use bfd_lld::config::AppConfig;
use bfd_lld::poller::{ErrorCode, Poller};
use bfd_lld::transport::{DeviceSession, DeviceTransport, SessionError, Target};

type Store = Arc<Mutex<HashMap<String, String>>>;
type CommandLog = Arc<Mutex<Vec<String>>>;

/// Мини-webdis для кэша типов устройств
async fn spawn_mock_webdis() -> (u16, Store) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let store: Store = Arc::new(Mutex::new(HashMap::new()));
    let served = store.clone();
    tokio::spawn(async move {
        loop {
            let (mut sock, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let store = served.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = sock.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request
                    .lines()
                    .next()
                    .and_then(|l| l.split_whitespace().nth(1))
                    .unwrap_or("")
                    .to_string();
                let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
                let body = match parts.as_slice() {
                    [_db, "GET", key] => match store.lock().unwrap().get(*key) {
                        Some(v) => format!("{{\"GET\":\"{}\"}}", v),
                        None => "{\"GET\":null}".to_string(),
                    },
                    [_db, "SETEX", key, _ttl, value] => {
                        store
                            .lock()
                            .unwrap()
                            .insert(key.to_string(), value.to_string());
                        "{\"SETEX\":[true,\"OK\"]}".to_string()
                    }
                    _ => "{}".to_string(),
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = sock.write_all(response.as_bytes()).await;
            });
        }
    });
    (port, store)
}

fn config_for(webdis_port: u16) -> AppConfig {
    let mut config = AppConfig::default();
    config.settings.cache.ip = "127.0.0.1".to_string();
    config.settings.cache.port = webdis_port;
    config
}

fn target() -> Target {
    Target {
        ip: "10.0.0.50".to_string(),
        username: "poller".to_string(),
        password: "secret".to_string(),
    }
}

/// Транспорт с заскриптованными ответами на команды
struct MockTransport {
    detect: Result<Option<String>, SessionError>,
    replies: Arc<HashMap<String, String>>,
    log: CommandLog,
}

impl MockTransport {
    fn new(detect: Result<Option<String>, SessionError>, replies: &[(&str, &str)]) -> Self {
        let replies = replies
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            detect,
            replies: Arc::new(replies),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl DeviceTransport for MockTransport {
    async fn autodetect(&self, _target: &Target) -> Result<Option<String>, SessionError> {
        self.log.lock().unwrap().push("autodetect".to_string());
        self.detect.clone()
    }

    async fn open(
        &self,
        _target: &Target,
        device_type: &str,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        self.log.lock().unwrap().push(format!("open:{}", device_type));
        Ok(Box::new(MockSession {
            replies: self.replies.clone(),
            log: self.log.clone(),
        }))
    }
}

struct MockSession {
    replies: Arc<HashMap<String, String>>,
    log: CommandLog,
}

#[async_trait]
impl DeviceSession for MockSession {
    async fn send_command(&mut self, command: &str) -> Result<String, SessionError> {
        self.log.lock().unwrap().push(command.to_string());
        self.replies
            .get(command)
            .cloned()
            .ok_or_else(|| SessionError::other(format!("Нет ответа на команду: {}", command)))
    }
}

const IOS_BFD_TABLE: &str = "\
IPv4 Sessions
NeighAddr                    LD/RD     RH/RS     State     Int
10.0.0.1                     1/1       Up        Up        Gi0/0/0
10.0.0.2                     2/4       Up        Down      Gi0/0/1
";

const IOS_DESCRIPTIONS: &str = "\
Interface Status Protocol Description
Gi0/0/0   up     up       Uplink to core
Gi0/0/1   up     up
";

#[tokio::test]
async fn ios_end_to_end_discovery_state_and_descriptions() {
    let (webdis_port, store) = spawn_mock_webdis().await;
    let config = config_for(webdis_port);
    let cache = DeviceTypeCache::new(&config).unwrap();
    let transport = MockTransport::new(
        Ok(Some("cisco_ios".to_string())),
        &[
            ("show bfd neighbors", IOS_BFD_TABLE),
            ("show interfaces description", IOS_DESCRIPTIONS),
        ],
    );
    let poller = Poller::new(&config, Some(&cache), &transport);

    let result = poller.poll(&target(), "dc1-router").await;

    assert!(result.found);
    assert_eq!(result.error, ErrorCode::None);
    assert!(result.errors.is_empty());

    // discovery: по записи на строку таблицы, в исходном порядке
    assert_eq!(result.discovery.len(), 2);
    assert_eq!(result.discovery[0].neighbor, "10.0.0.1");
    assert_eq!(result.discovery[0].session_id, "1");
    assert_eq!(result.discovery[0].session_ok, ".*BFD_SESS_UP.*ld:");
    assert_eq!(result.discovery[1].neighbor, "10.0.0.2");

    // состояние: Up -> 1, всё прочее -> 0
    assert_eq!(result.state[0], ("10.0.0.1".to_string(), 1));
    assert_eq!(result.state[1], ("10.0.0.2".to_string(), 0));

    // описание подтянулось из общей таблицы
    assert_eq!(result.interfaces[0].interface, "Gi0/0/0");
    assert_eq!(result.interfaces[0].description, "Uplink to core");
    assert_eq!(result.interfaces[1].description, "");

    // результат автоопределения закэширован
    assert_eq!(
        store.lock().unwrap().get("Template_Net_Syslog_10.0.0.50"),
        Some(&"cisco_ios".to_string())
    );
}

const NXOS_BFD_TABLE: &str = "\
OurAddr         NeighAddr       LD/RD                 RH/RS           Holdown(mult)     State       Int             Vrf
10.0.0.254      10.0.0.1        1107296256/0          Up              183(3)            Up          Eth1/1          default
10.0.0.254      10.0.0.2        1107296257/5          Up              180(3)            Up          Eth1/2          default
";

const NXOS_DESC_INTERFACE_SHAPE: &str = concat!(
    "\n",
    "Interface                Description\n",
    "-------------------------------------\n",
    "Eth1/1                   Uplink to spine\n",
);

const NXOS_DESC_PORT_SHAPE: &str = concat!(
    "\n",
    "-------------------------------------\n",
    "Port                     Description\n",
    "-------------------------------------\n",
    "Eth1/2                   Link to border\n",
);

#[tokio::test]
async fn nxos_end_to_end_tolerates_both_reply_shapes() {
    let (webdis_port, store) = spawn_mock_webdis().await;
    // тип устройства уже в кэше: автоопределение не понадобится
    store.lock().unwrap().insert(
        "Template_Net_Syslog_10.0.0.50".to_string(),
        "cisco_nxos".to_string(),
    );
    let config = config_for(webdis_port);
    let cache = DeviceTypeCache::new(&config).unwrap();
    let transport = MockTransport::new(
        Ok(None),
        &[
            ("show bfd neighbors vrf all", NXOS_BFD_TABLE),
            ("show interface Eth1/1 description", NXOS_DESC_INTERFACE_SHAPE),
            ("show interface Eth1/2 description", NXOS_DESC_PORT_SHAPE),
        ],
    );
    let poller = Poller::new(&config, Some(&cache), &transport);

    let result = poller.poll(&target(), "dc1-leaf").await;

    assert!(result.found);
    assert_eq!(result.error, ErrorCode::None);
    assert_eq!(result.discovery.len(), 2);
    assert_eq!(result.discovery[0].session_id, "1107296256");
    assert_eq!(
        result.discovery[0].session_ok,
        ".*BFD.*SESSION_STATE_UP.*session.*"
    );

    // обе формы ответа разобраны без ошибок
    assert_eq!(result.interfaces[0].description, "Uplink to spine");
    assert_eq!(result.interfaces[1].description, "Link to border");

    // кэш попал: автоопределение не запускалось
    let log = transport.log.lock().unwrap();
    assert!(!log.iter().any(|c| c == "autodetect"));
}

#[tokio::test]
async fn unknown_vendor_short_circuits_without_commands() {
    let (webdis_port, store) = spawn_mock_webdis().await;
    store.lock().unwrap().insert(
        "Template_Net_Syslog_10.0.0.50".to_string(),
        "juniper".to_string(),
    );
    let config = config_for(webdis_port);
    let cache = DeviceTypeCache::new(&config).unwrap();
    let transport = MockTransport::new(Ok(None), &[]);
    let poller = Poller::new(&config, Some(&cache), &transport);

    let result = poller.poll(&target(), "dc1-router").await;

    assert!(result.discovery.is_empty());
    assert!(result.state.is_empty());
    assert_eq!(result.error, ErrorCode::None);
    // ни автоопределения, ни открытия сессии, ни команд
    assert!(transport.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn autodetect_timeout_leaves_cache_untouched() {
    let (webdis_port, store) = spawn_mock_webdis().await;
    let config = config_for(webdis_port);
    let cache = DeviceTypeCache::new(&config).unwrap();
    let transport = MockTransport::new(
        Err(SessionError::timeout("Таймаут подключения к 10.0.0.50")),
        &[],
    );
    let poller = Poller::new(&config, Some(&cache), &transport);

    let result = poller.poll(&target(), "dc1-router").await;

    assert_eq!(result.error, ErrorCode::Timeout);
    assert!(result.discovery.is_empty());
    assert!(store.lock().unwrap().is_empty());
    // до открытия сессии дело не дошло
    let log = transport.log.lock().unwrap();
    assert_eq!(log.as_slice(), ["autodetect"]);
}

#[tokio::test]
async fn unreachable_cache_degrades_to_miss_with_error_string() {
    // кэш указывает на порт без слушателя
    let config = config_for(1);
    let cache = DeviceTypeCache::new(&config).unwrap();
    let transport = MockTransport::new(
        Ok(Some("cisco_ios".to_string())),
        &[
            ("show bfd neighbors", IOS_BFD_TABLE),
            ("show interfaces description", IOS_DESCRIPTIONS),
        ],
    );
    let poller = Poller::new(&config, Some(&cache), &transport);

    let result = poller.poll(&target(), "dc1-router").await;

    // опрос состоялся несмотря на мёртвый кэш
    assert!(result.found);
    assert_eq!(result.discovery.len(), 2);
    assert_eq!(result.errors, vec!["Сервер REDIS недоступен.".to_string()]);
    assert_eq!(result.error, ErrorCode::None);
}

#[tokio::test]
async fn description_failure_keeps_discovery_and_state() {
    let (webdis_port, store) = spawn_mock_webdis().await;
    store.lock().unwrap().insert(
        "Template_Net_Syslog_10.0.0.50".to_string(),
        "cisco_ios".to_string(),
    );
    let config = config_for(webdis_port);
    let cache = DeviceTypeCache::new(&config).unwrap();
    // таблица BFD отвечает, команда описаний — нет
    let transport = MockTransport::new(Ok(None), &[("show bfd neighbors", IOS_BFD_TABLE)]);
    let poller = Poller::new(&config, Some(&cache), &transport);

    let result = poller.poll(&target(), "dc1-router").await;

    // уже разобранные сессии не пропадают: пустой LLD снял бы их с мониторинга
    assert!(result.found);
    assert_eq!(result.discovery.len(), 2);
    assert_eq!(result.discovery[0].neighbor, "10.0.0.1");
    assert_eq!(result.state[0], ("10.0.0.1".to_string(), 1));
    assert_eq!(result.state[1], ("10.0.0.2".to_string(), 0));
    assert!(result.interfaces.is_empty());
    assert_eq!(
        result.error,
        ErrorCode::Other("Нет ответа на команду: show interfaces description".to_string())
    );
}

#[tokio::test]
async fn poll_runs_without_cache_at_all() {
    let config = AppConfig::default();
    let transport = MockTransport::new(
        Ok(Some("cisco_ios".to_string())),
        &[
            ("show bfd neighbors", IOS_BFD_TABLE),
            ("show interfaces description", IOS_DESCRIPTIONS),
        ],
    );
    let poller = Poller::new(&config, None, &transport);

    let result = poller.poll(&target(), "dc1-router").await;

    // отсутствие кэша — промах плюс строка в summary, а не пропуск опроса
    assert!(result.found);
    assert_eq!(result.discovery.len(), 2);
    assert_eq!(result.error, ErrorCode::None);
    assert_eq!(result.errors, vec!["Сервер REDIS недоступен.".to_string()]);
    let log = transport.log.lock().unwrap();
    assert!(log.iter().any(|c| c == "autodetect"));
}

#[tokio::test]
async fn empty_device_table_is_success_with_empty_discovery() {
    let (webdis_port, store) = spawn_mock_webdis().await;
    store.lock().unwrap().insert(
        "Template_Net_Syslog_10.0.0.50".to_string(),
        "cisco_ios".to_string(),
    );
    let config = config_for(webdis_port);
    let cache = DeviceTypeCache::new(&config).unwrap();
    let transport = MockTransport::new(
        Ok(None),
        &[("show bfd neighbors", "No BFD host configured\n")],
    );
    let poller = Poller::new(&config, Some(&cache), &transport);

    let result = poller.poll(&target(), "dc1-router").await;

    assert!(!result.found);
    assert!(result.discovery.is_empty());
    assert_eq!(result.error, ErrorCode::None);
    // корреляция описаний не запускалась
    let log = transport.log.lock().unwrap();
    assert!(!log.iter().any(|c| c.contains("description")));
}

#[tokio::test]
async fn prompt_failure_on_special_host_reports_timeout() {
    let (webdis_port, store) = spawn_mock_webdis().await;
    store.lock().unwrap().insert(
        "Template_Net_Syslog_10.0.0.50".to_string(),
        "cisco_ios".to_string(),
    );
    let config = config_for(webdis_port);
    let cache = DeviceTypeCache::new(&config).unwrap();
    // сессия открывается, но команда падает с "Unable to find prompt"
    struct PromptlessTransport;
    #[async_trait]
    impl DeviceTransport for PromptlessTransport {
        async fn autodetect(&self, _t: &Target) -> Result<Option<String>, SessionError> {
            Ok(None)
        }
        async fn open(
            &self,
            _t: &Target,
            _dt: &str,
        ) -> Result<Box<dyn DeviceSession>, SessionError> {
            Ok(Box::new(PromptlessSession))
        }
    }
    struct PromptlessSession;
    #[async_trait]
    impl DeviceSession for PromptlessSession {
        async fn send_command(&mut self, _c: &str) -> Result<String, SessionError> {
            Err(SessionError::prompt_not_found("Unable to find prompt: banner"))
        }
    }

    let transport = PromptlessTransport;
    let poller = Poller::new(&config, Some(&cache), &transport);

    // особый префикс хоста: сбой приглашения считается таймаутом
    let special = poller.poll(&target(), "UAK-router-1").await;
    assert_eq!(special.error, ErrorCode::Timeout);

    // обычный хост: тот же сбой уходит в текст ошибки
    let ordinary = poller.poll(&target(), "msk-router-1").await;
    assert_eq!(
        ordinary.error,
        ErrorCode::Other("Unable to find prompt: banner".to_string())
    );
}
