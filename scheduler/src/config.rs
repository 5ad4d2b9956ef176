/* config.rs

  Dev Notes:
  * No need to create a 'config' mod { } here, since we're in a separate physical file.
  * Do not import mysql like this: 'use mysql::*;'. Doing so overrides default types, like Error.
*/

use std::{fmt, fs};

use camino::Utf8PathBuf;
use chrono_tz::Tz;
use mysql::{Opts, Pool};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::errors::ConfigError;
use crate::logging::LevelFilterWrapper;

static CONFIG_FILE_PATH: &str = "/etc/scheduler/scheduler.toml";

/// Which relational dialect `sql_type` selects; drives identifier quoting in `crate::store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
	MariaDb,
	Postgres,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct AppConfig {
	pub environment_name: Option<String>,
	pub full_refresh_internal_secs: u32,
	pub scheduler_polling_interval: u64,
	pub time_zone_string: String,
	pub tracing_level: LevelFilterWrapper,
	pub startup_without_database_connections: bool,

	pub sql_type: String,
	sql_user: String,
	sql_password: String,
	sql_host: String,
	sql_port: u32,
	sql_database: String,
	pub sql_schema: Option<String>,

	pub rq_host: String,
	pub rq_port: u32,

	pub socket_path: String,
	pub socket_file_group_owner: String,
	pub disable_unix_socket: Option<bool>,
	pub tcp_socket_port: Option<u16>,
	pub disable_tcp_socket: Option<bool>,

	pub webserver_ip: String,
	pub webserver_port: u16,
	pub webserver_host_header: Option<String>,
	pub webserver_token: String,
}

impl AppConfig {
	pub fn new_from_toml_string(any_string: &str) -> Result<AppConfig, ConfigError> {
		toml::from_str(any_string).map_err(|source| ConfigError::ConfigLoad { source })
	}

	pub fn new_from_toml_file(config_file_path: Option<&str>) -> Result<AppConfig, ConfigError> {
		let file_path: Utf8PathBuf = match config_file_path {
			Some(value) => value.into(),
			None => CONFIG_FILE_PATH.into(),
		};

		if !file_path.exists() {
			AppConfig::print_default_config_exit(&file_path);
			return Err(ConfigError::MissingConfigFile);
		}

		let file_contents = fs::read_to_string(&file_path).map_err(|_io_error| ConfigError::MissingConfigFile)?;
		AppConfig::new_from_toml_string(&file_contents)
	}

	pub fn print_default_config_exit(file_path: &Utf8PathBuf) {
		error!("Error: No configuration file was found at path: {}", file_path);
		error!("You will need to create a configuration file manually.");
		error!("Below is an example of the file's contents:\n");
		let default_config = AppConfig {
			environment_name: Some("Development".to_string()),
			full_refresh_internal_secs: 3600,
			scheduler_polling_interval: 60,
			time_zone_string: "UTC".to_string(),
			tracing_level: LevelFilterWrapper::new(tracing_subscriber::filter::LevelFilter::INFO),
			startup_without_database_connections: false,
			sql_type: "postgres".to_string(),
			sql_user: "postgres".to_string(),
			sql_password: "change-me".to_string(),
			sql_host: "127.0.0.1".to_string(),
			sql_port: 5432,
			sql_database: "scheduler".to_string(),
			sql_schema: Some("public".to_string()),
			rq_host: "127.0.0.1".to_string(),
			rq_port: 6379,
			socket_path: "/tmp/scheduler.sock".to_string(),
			socket_file_group_owner: "scheduler_group".to_string(),
			disable_unix_socket: None,
			tcp_socket_port: Some(11000),
			disable_tcp_socket: None,
			webserver_ip: "127.0.0.1".to_string(),
			webserver_port: 8000,
			webserver_host_header: None,
			webserver_token: "token abcd1234".to_string(),
		};
		let toml_string = toml::to_string(&default_config).unwrap();
		warn!("{}", toml_string);
		std::process::exit(1);
	}

	pub fn tz(&self) -> Result<Tz, chrono_tz::ParseError> {
		self.time_zone_string.parse()
	}

	pub fn sql_dialect(&self) -> Result<SqlDialect, ConfigError> {
		match self.sql_type.as_str() {
			"mariadb" => Ok(SqlDialect::MariaDb),
			"postgres" => Ok(SqlDialect::Postgres),
			other => Err(ConfigError::UnknownSqlType { found: other.to_owned() }),
		}
	}

	pub fn unix_socket_enabled(&self) -> bool {
		!self.disable_unix_socket.unwrap_or(false)
	}

	pub fn tcp_socket_enabled(&self) -> bool {
		!self.disable_tcp_socket.unwrap_or(false) && self.tcp_socket_port.is_some()
	}

	pub fn get_postgres_connection_string(&self) -> String {
		format!(
			"postgresql://{user}:{password}@{host}:{port}/{database}",
			user = self.sql_user,
			password = self.sql_password,
			host = self.sql_host,
			port = self.sql_port,
			database = self.sql_database
		)
	}
}

impl fmt::Display for AppConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"Scheduler Daemon Configuration ({}):\n
* SQL Dialect: {}
* SQL Username: {}
* SQL Password: {}
* SQL Host: {}:{}
* SQL Database: {}
* Redis Host: {}
* Redis Port: {}
* Unix Domain Socket Path: {}
* Socket File Group Owner: {}
* TCP Control Port: {:?}
* Scheduler Polling Interval: {}
* Full Refresh Interval (secs): {}
* Web Server IP: {}
* Web Server Port: {}
* Web Server Host Header: {:?}
",
			CONFIG_FILE_PATH,
			self.sql_type,
			self.sql_user,
			"********",
			self.sql_host,
			self.sql_port,
			self.sql_database,
			self.rq_host,
			self.rq_port,
			self.socket_path,
			self.socket_file_group_owner,
			self.tcp_socket_port,
			self.scheduler_polling_interval,
			self.full_refresh_internal_secs,
			self.webserver_ip,
			self.webserver_port,
			self.webserver_host_header,
		)
	}
}

/// Obtain a pooled MariaDB/MySQL connection, per the `sql_*` settings.
pub fn get_mysql_conn(config: &AppConfig) -> Result<mysql::PooledConn, mysql::error::Error> {
	let url = format!(
		"mysql://{user}:{password}@{host}:{port}/{database}",
		user = config.sql_user,
		password = config.sql_password,
		host = config.sql_host,
		port = config.sql_port,
		database = config.sql_database
	);
	let opts = Opts::from_url(&url)?;
	let pool = Pool::new(opts)?;
	pool.get_conn()
}

pub fn get_mysql_pool(config: &AppConfig) -> Result<mysql::Pool, mysql::error::Error> {
	let url = format!(
		"mysql://{user}:{password}@{host}:{port}/{database}",
		user = config.sql_user,
		password = config.sql_password,
		host = config.sql_host,
		port = config.sql_port,
		database = config.sql_database
	);
	let opts = Opts::from_url(&url)?;
	Pool::new(opts)
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE_TOML: &str = r#"
environment_name = "Testing"
full_refresh_internal_secs = 3600
scheduler_polling_interval = 60
time_zone_string = "America/Los_Angeles"
tracing_level = "INFO"
startup_without_database_connections = false
sql_type = "postgres"
sql_user = "postgres"
sql_password = "secret"
sql_host = "127.0.0.1"
sql_port = 5432
sql_database = "scheduler"
sql_schema = "public"
rq_host = "127.0.0.1"
rq_port = 6379
socket_path = "/tmp/scheduler.sock"
socket_file_group_owner = "scheduler_group"
tcp_socket_port = 11000
webserver_ip = "127.0.0.1"
webserver_port = 8000
webserver_token = "abcd1234"
"#;

	#[test]
	fn parses_minimal_valid_toml() {
		let config = AppConfig::new_from_toml_string(SAMPLE_TOML).unwrap();
		assert_eq!(config.sql_dialect().unwrap(), SqlDialect::Postgres);
		assert!(config.tz().is_ok());
		assert!(config.tcp_socket_enabled());
		assert!(config.unix_socket_enabled());
	}

	#[test]
	fn rejects_unrecognized_sql_type() {
		let bad = SAMPLE_TOML.replace("sql_type = \"postgres\"", "sql_type = \"oracle\"");
		let config = AppConfig::new_from_toml_string(&bad).unwrap();
		assert!(config.sql_dialect().is_err());
	}
}
