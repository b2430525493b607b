use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ssh2::Session;
use tokio::task;
use tracing::debug;

use super::{DeviceSession, DeviceTransport, SessionError, SessionErrorKind, Target};
use crate::config::AppConfig;

const SSH_PORT: u16 = 22;
// Короткие блокирующие чтения из канала, дедлайн приглашения ведём сами
const POLL_INTERVAL_MS: u32 = 500;

/// SSH транспорт поверх libssh2. Блокирующие вызовы выполняются
/// через spawn_blocking, чтобы не держать рантайм.
pub struct SshTransport {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl SshTransport {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
        }
    }
}

#[async_trait]
impl DeviceTransport for SshTransport {
    async fn autodetect(&self, target: &Target) -> Result<Option<String>, SessionError> {
        let target = target.clone();
        let connect_timeout = self.connect_timeout;
        let read_timeout = self.read_timeout;
        task::spawn_blocking(move || {
            let mut shell = ShellInner::open(&target, connect_timeout, read_timeout)?;
            let version = shell.run("show version")?;
            Ok(detect_from_version(&version))
        })
        .await
        .map_err(|e| SessionError::other(format!("Фоновая задача SSH прервана: {}", e)))?
    }

    async fn open(
        &self,
        target: &Target,
        device_type: &str,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        debug!(ip = %target.ip, device_type, "Открываем SSH сессию");
        let target = target.clone();
        let connect_timeout = self.connect_timeout;
        let read_timeout = self.read_timeout;
        let inner = task::spawn_blocking(move || {
            ShellInner::open(&target, connect_timeout, read_timeout)
        })
        .await
        .map_err(|e| SessionError::other(format!("Фоновая задача SSH прервана: {}", e)))??;
        Ok(Box::new(SshSession { inner: Some(inner) }))
    }
}

/// Командная сессия поверх открытого интерактивного shell
pub struct SshSession {
    inner: Option<ShellInner>,
}

#[async_trait]
impl DeviceSession for SshSession {
    async fn send_command(&mut self, command: &str) -> Result<String, SessionError> {
        let mut inner = self
            .inner
            .take()
            .ok_or_else(|| SessionError::other("SSH сессия уже закрыта"))?;
        let command = command.to_string();
        let (inner, result) = task::spawn_blocking(move || {
            let result = inner.run(&command);
            (inner, result)
        })
        .await
        .map_err(|e| SessionError::other(format!("Фоновая задача SSH прервана: {}", e)))?;
        self.inner = Some(inner);
        result
    }
}

struct ShellInner {
    // сессию нужно держать живой, пока открыт канал
    _session: Session,
    channel: ssh2::Channel,
    prompt_timeout: Duration,
}

impl ShellInner {
    fn open(
        target: &Target,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let addr = (target.ip.as_str(), SSH_PORT)
            .to_socket_addrs()
            .map_err(|e| {
                SessionError::new(
                    SessionErrorKind::Connect,
                    format!("Не удалось разрешить адрес {}: {}", target.ip, e),
                )
            })?
            .next()
            .ok_or_else(|| {
                SessionError::new(
                    SessionErrorKind::Connect,
                    format!("Пустой список адресов для {}", target.ip),
                )
            })?;

        let tcp = TcpStream::connect_timeout(&addr, connect_timeout).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                SessionError::timeout(format!("Таймаут подключения к {}", target.ip))
            } else {
                SessionError::new(
                    SessionErrorKind::Connect,
                    format!("Не удалось подключиться к {}: {}", target.ip, e),
                )
            }
        })?;

        let mut session = Session::new().map_err(|e| {
            SessionError::other(format!("Не удалось создать SSH сессию: {}", e))
        })?;
        session.set_tcp_stream(tcp);
        session.set_timeout(connect_timeout.as_millis() as u32);
        session.handshake().map_err(|e| {
            SessionError::new(
                SessionErrorKind::Connect,
                format!("SSH handshake не удался: {}", e),
            )
        })?;
        session
            .userauth_password(&target.username, &target.password)
            .map_err(|e| SessionError::auth(format!("Аутентификация не удалась: {}", e)))?;

        let mut channel = session.channel_session().map_err(|e| {
            SessionError::new(
                SessionErrorKind::Connect,
                format!("Не удалось открыть канал: {}", e),
            )
        })?;
        channel.request_pty("vt100", None, None).map_err(|e| {
            SessionError::new(
                SessionErrorKind::Connect,
                format!("Не удалось запросить pty: {}", e),
            )
        })?;
        channel.shell().map_err(|e| {
            SessionError::new(
                SessionErrorKind::Connect,
                format!("Не удалось запустить shell: {}", e),
            )
        })?;
        session.set_timeout(POLL_INTERVAL_MS);

        let mut shell = Self {
            _session: session,
            channel,
            prompt_timeout: read_timeout,
        };
        // баннер и первое приглашение
        shell.read_until_prompt()?;
        // отключаем постраничный вывод, иначе длинные таблицы повиснут
        shell.run("terminal length 0")?;
        Ok(shell)
    }

    fn run(&mut self, command: &str) -> Result<String, SessionError> {
        self.channel
            .write_all(command.as_bytes())
            .and_then(|_| self.channel.write_all(b"\n"))
            .and_then(|_| self.channel.flush())
            .map_err(|e| {
                SessionError::io(format!("Не удалось отправить команду: {}", e))
            })?;
        let raw = self.read_until_prompt()?;
        Ok(strip_echo_and_prompt(&raw, command))
    }

    /// Читает вывод, пока последняя непустая строка не закончится
    /// приглашением устройства, либо пока не истечёт дедлайн.
    fn read_until_prompt(&mut self) -> Result<String, SessionError> {
        let deadline = Instant::now() + self.prompt_timeout;
        let mut out = String::new();
        let mut buf = [0u8; 4096];
        loop {
            match self.channel.read(&mut buf) {
                Ok(0) => return Ok(out),
                Ok(n) => {
                    out.push_str(&String::from_utf8_lossy(&buf[..n]));
                    if ends_with_prompt(&out) {
                        return Ok(out);
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::TimedOut
                            | std::io::ErrorKind::WouldBlock
                            | std::io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    return Err(SessionError::io(format!(
                        "Ошибка чтения из канала: {}",
                        e
                    )))
                }
            }
            if Instant::now() >= deadline {
                return Err(SessionError::prompt_not_found(format!(
                    "Unable to find prompt: {}",
                    last_line(&out)
                )));
            }
        }
    }
}

fn ends_with_prompt(output: &str) -> bool {
    let trimmed = output.trim_end();
    trimmed.ends_with('#') || trimmed.ends_with('>')
}

fn last_line(output: &str) -> &str {
    output.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}

/// Убирает эхо команды в начале и приглашение в конце вывода
fn strip_echo_and_prompt(raw: &str, command: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().collect();
    if lines
        .first()
        .map(|l| l.trim_end().ends_with(command))
        .unwrap_or(false)
    {
        lines.remove(0);
    }
    if lines.last().map(|l| ends_with_prompt(l)).unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n")
}

/// Определяет тип устройства по выводу "show version".
/// None — устройство отвечает, но мы его не опознали.
fn detect_from_version(version: &str) -> Option<String> {
    if version.contains("NX-OS") || version.contains("Nexus") {
        Some("cisco_nxos".to_string())
    } else if version.contains("Cisco IOS") {
        Some("cisco_ios".to_string())
    } else {
        None
    }
}
