// store.rs
//
// Schedule Store Client (C2): read-only access to the externally-owned relational store
// of task schedules. Two dialects are supported, differentiated by identifier quoting:
// MariaDB/MySQL (backtick-quoted identifiers) and Postgres (double-quote-quoted
// identifiers, the primary dialect of the system this was translated from).

use std::sync::Mutex;

use mysql::prelude::Queryable;
use mysql::Pool as MySqlPool;
use postgres::{Client as PgClient, NoTls};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::StoreError;

/// A read-only view of one schedule row, as projected from the external store.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
	pub schedule_id: String,
	pub task_id: String,
	pub enabled: bool,
	pub queue_name: String,
	pub cron_string: String,
	pub cron_timezone: String,
	pub description: String,
	pub argument_overrides: Option<String>,
}

pub trait ScheduleStore: Send + Sync {
	/// Returns every schedule_id currently enabled in the store.
	fn list_enabled_schedule_ids(&self) -> Result<Vec<String>, StoreError>;

	/// Fetches a single schedule by id, joined with the singleton cron-timezone
	/// configuration row.
	fn fetch_schedule(&self, schedule_id: &str) -> Result<Schedule, StoreError>;
}

pub fn build_store(config: &AppConfig) -> Result<Box<dyn ScheduleStore>, StoreError> {
	use crate::config::SqlDialect;

	let dialect = config
		.sql_dialect()
		.map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;

	match dialect {
		SqlDialect::MariaDb => Ok(Box::new(MariaDbStore::new(config)?)),
		SqlDialect::Postgres => Ok(Box::new(PostgresStore::new(config)?)),
	}
}

pub struct MariaDbStore {
	pool: MySqlPool,
}

impl MariaDbStore {
	pub fn new(config: &AppConfig) -> Result<Self, StoreError> {
		let pool = crate::config::get_mysql_pool(config).map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;
		Ok(MariaDbStore { pool })
	}
}

impl ScheduleStore for MariaDbStore {
	fn list_enabled_schedule_ids(&self) -> Result<Vec<String>, StoreError> {
		let mut conn = self.pool.get_conn().map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;
		let query = "SELECT `schedule_id` FROM `schedule` WHERE `enabled` = 1 ORDER BY `schedule_id`";
		conn.query(query).map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })
	}

	fn fetch_schedule(&self, schedule_id: &str) -> Result<Schedule, StoreError> {
		let mut conn = self.pool.get_conn().map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;
		let query = format!(
			"SELECT `Schedule`.`schedule_id`, `Schedule`.`task_id`, `Schedule`.`enabled`, \
			 `Schedule`.`queue_name`, `Schedule`.`cron_string`, `Schedule`.`description`, \
			 `Schedule`.`argument_overrides`, `Configuration`.`cron_time_zone` \
			 FROM `schedule` AS `Schedule` \
			 INNER JOIN `scheduler_configuration` AS `Configuration` ON 1 = 1 \
			 WHERE `Schedule`.`schedule_id` = '{}' LIMIT 1",
			schedule_id.replace('\'', "''")
		);

		let row: Option<(String, String, bool, String, String, String, Option<String>, String)> =
			conn.query_first(query).map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;

		match row {
			Some((schedule_id, task_id, enabled, queue_name, cron_string, description, argument_overrides, cron_timezone)) => Ok(Schedule {
				schedule_id,
				task_id,
				enabled,
				queue_name,
				cron_string,
				cron_timezone,
				description,
				argument_overrides,
			}),
			None => Err(StoreError::NotFound { schedule_id: schedule_id.to_owned() }),
		}
	}
}

pub struct PostgresStore {
	client: Mutex<PgClient>,
	schema: String,
}

impl PostgresStore {
	pub fn new(config: &AppConfig) -> Result<Self, StoreError> {
		let client = PgClient::connect(&config.get_postgres_connection_string(), NoTls)
			.map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;
		Ok(PostgresStore {
			client: Mutex::new(client),
			schema: config.sql_schema.clone().unwrap_or_else(|| "public".to_string()),
		})
	}
}

impl ScheduleStore for PostgresStore {
	fn list_enabled_schedule_ids(&self) -> Result<Vec<String>, StoreError> {
		let mut client = self.client.lock().expect("Postgres client mutex poisoned");
		let query = format!(
			"SELECT \"schedule_id\" FROM \"{}\".\"schedule\" WHERE \"enabled\" = true ORDER BY \"schedule_id\"",
			self.schema
		);
		let rows = client.query(&query, &[]).map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;
		Ok(rows.iter().map(|row| row.get::<_, String>("schedule_id")).collect())
	}

	fn fetch_schedule(&self, schedule_id: &str) -> Result<Schedule, StoreError> {
		let mut client = self.client.lock().expect("Postgres client mutex poisoned");
		let query = format!(
			"SELECT \
				\"Schedule\".\"schedule_id\", \
				\"Schedule\".\"task_id\", \
				\"Schedule\".\"enabled\", \
				\"Schedule\".\"queue_name\", \
				\"Schedule\".\"cron_string\", \
				\"Schedule\".\"description\", \
				\"Schedule\".\"argument_overrides\", \
				\"Configuration\".\"cron_time_zone\" AS \"cron_timezone\" \
			FROM \"{schema}\".\"schedule\" AS \"Schedule\" \
			INNER JOIN \"{schema}\".\"scheduler_configuration\" AS \"Configuration\" ON true \
			WHERE \"Schedule\".\"schedule_id\" = $1 \
			LIMIT 1",
			schema = self.schema
		);

		let maybe_row = client.query_opt(&query, &[&schedule_id]).map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;

		match maybe_row {
			Some(row) => Ok(Schedule {
				schedule_id: row.get("schedule_id"),
				task_id: row.get("task_id"),
				enabled: row.get("enabled"),
				queue_name: row.get("queue_name"),
				cron_string: row.get("cron_string"),
				description: row.get("description"),
				argument_overrides: row.get("argument_overrides"),
				cron_timezone: row.get("cron_timezone"),
			}),
			None => {
				debug!("Schedule '{}' not found in Postgres store.", schedule_id);
				Err(StoreError::NotFound { schedule_id: schedule_id.to_owned() })
			}
		}
	}
}

/// Probe the store for liveness. Failure here is soft: the supervisor logs and
/// proceeds, since an empty schedule table is a legitimate startup state.
pub fn probe(store: &dyn ScheduleStore) {
	match store.list_enabled_schedule_ids() {
		Ok(ids) => debug!("Schedule store probe succeeded; {} enabled schedule(s).", ids.len()),
		Err(e) => warn!("Schedule store probe failed (continuing anyway): {}", e),
	}
}
