//! bfd-lld — одноразовый опрос BFD сессий сетевого устройства.
//!
//! За один запуск: определяем тип устройства (кэш или автоопределение по
//! SSH), выполняем вендорскую команду, разбираем таблицу соседей,
//! подтягиваем описания интерфейсов и отправляем discovery/state данные
//! в Zabbix trapper. Любой сбой превращается в данные, а не в ненулевой
//! код выхода.

pub mod cache;
pub mod config;
pub mod poller;
pub mod report;
pub mod transport;
pub mod vendor;

pub use cache::DeviceTypeCache;
pub use config::AppConfig;
pub use poller::{BfdSession, ErrorCode, PollResult, Poller};
pub use report::{DiscoveryRecord, TrapperSender};
pub use transport::{DeviceSession, DeviceTransport, SessionError, SessionErrorKind, Target};
pub use vendor::{Vendor, VendorSchema};
