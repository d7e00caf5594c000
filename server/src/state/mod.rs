pub mod accounts;
pub mod monitor;
pub mod supervisor;

pub use accounts::AccountMonitorFactory;
pub use monitor::{MonitorContext, MonitorSettings};
pub use supervisor::{MonitorFactory, MonitorSupervisor};
