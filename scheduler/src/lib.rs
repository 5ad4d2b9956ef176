#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod consumer;
pub mod control;
pub mod cron;
pub mod dispatch;
pub mod errors;
pub mod fik;
pub mod logging;
pub mod queue;
pub mod refill;
pub mod store;

pub fn get_package_version() -> &'static str {
	const VERSION: &str = env!("CARGO_PKG_VERSION");
	VERSION
}
