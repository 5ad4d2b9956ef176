// errors.rs

use thiserror::Error as ThisError;
use toml::de::Error as TomlError;

#[derive(ThisError, Debug)]
pub enum ConfigError {
	#[error("Could not deserialize TOML into a Rust object.\n    {source:?}")]
	ConfigLoad {
		#[from]
		source: TomlError,
	},
	#[error("Cannot find the TOML configuration file on disk.")]
	MissingConfigFile,
	#[error("Unrecognized 'sql_type' value: {found}. Expected 'mariadb' or 'postgres'.")]
	UnknownSqlType { found: String },
}

#[derive(ThisError, Debug, PartialEq)]
pub enum CronError {
	#[error("Cron expression has the wrong number of elements (should be one of 5, 6, or 7).")]
	WrongQtyOfElements { found: usize },
	#[error("Invalid cron expression; could not transform into a CronStruct.")]
	InvalidExpression,
	#[error("Time zone '{zone}' is not a recognized IANA zone.")]
	UnknownZone { zone: String },
	#[error("Cron expression has no future firing within the search horizon.")]
	NoFutureFiring,
}

#[derive(ThisError, Debug, PartialEq)]
pub enum StringError {
	#[error("Malformed FIK string; expected '<schedule_id>|<unix_seconds>', found '{found}'.")]
	MalformedFik { found: String },
}

/// Errors surfaced by the Schedule Store Client (C2).
#[derive(ThisError, Debug)]
pub enum StoreError {
	#[error("Relational store is unavailable: {reason}")]
	StoreUnavailable { reason: String },
	#[error("Schedule '{schedule_id}' was not found in the store.")]
	NotFound { schedule_id: String },
}

/// Errors surfaced by the Job Queue Client (C3) for Redis operations.
#[derive(ThisError, Debug)]
pub enum QueueError {
	#[error("Redis is unavailable: {0}")]
	RedisUnavailable(#[from] redis::RedisError),
}

/// Errors surfaced when handing a firing off to the web application for materialization.
#[derive(ThisError, Debug)]
pub enum HandoffError {
	#[error("HTTP transport error while calling handoff endpoint: {0}")]
	Transport(String),
	#[error("Handoff endpoint responded with non-2xx status {status}: {body}")]
	NonSuccessStatus { status: u16, body: String },
}

/// Errors surfaced while handling a single Control Listener connection (C8).
#[derive(ThisError, Debug)]
pub enum ControlProtocolError {
	#[error("Could not parse client message as JSON: {0}")]
	MalformedJson(String),
	#[error("Unrecognized request_type: {0}")]
	UnknownRequestType(String),
	#[error("Request '{request_type}' is missing required field 'request_content'.")]
	MissingRequestContent { request_type: String },
	#[error("Request '{request_type}' requires a string 'request_content', but one was not supplied.")]
	InvalidRequestContent { request_type: String },
	#[error("Transport error while servicing client connection: {0}")]
	Transport(#[from] std::io::Error),
}
