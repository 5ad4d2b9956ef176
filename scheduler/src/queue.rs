// queue.rs
//
// Job Queue Client (C3): maintains the Redis sorted-set time index and performs the
// HTTP handoff that hands a due firing to the web application for materialization.
//
// The time index lives at a single well-known key. Its members are Firing Instance Keys
// (see `crate::fik`); their scores are numerically identical to the unix-seconds half of
// the member, which is what lets ZRANGEBYSCORE double as "give me everything due by now".

use std::time::Duration;

use redis::{Client, Commands, Connection};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{HandoffError, QueueError};
use crate::fik::Fik;

pub static TIME_INDEX_KEY: &str = "btu_scheduler:task_execution_times";

const HANDOFF_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct JobQueue {
	client: Client,
}

impl JobQueue {
	pub fn new(config: &AppConfig) -> Result<Self, QueueError> {
		let url = format!("redis://{}:{}/", config.rq_host, config.rq_port);
		let client = Client::open(url)?;
		Ok(JobQueue { client })
	}

	fn connection(&self) -> Result<Connection, QueueError> {
		Ok(self.client.get_connection()?)
	}

	/// Liveness check; used by the supervisor at startup and is itself allowed to fail hard.
	pub fn ping(&self) -> Result<(), QueueError> {
		let mut conn = self.connection()?;
		let _: String = redis::cmd("PING").query(&mut conn)?;
		Ok(())
	}

	/// Upserts a FIK into the time index. Returns true if this call created a new member
	/// (ZADD semantics already make re-adding an existing member with an unchanged score a
	/// no-op, so repeated upserts of the same firing are safe).
	pub fn index_upsert(&self, fik: &Fik) -> Result<bool, QueueError> {
		let added: i64 = {
			let mut conn = self.connection()?;
			conn.zadd(TIME_INDEX_KEY, fik.as_member(), fik.unix_seconds())?
		};
		Ok(added == 1)
	}

	/// Returns every FIK whose score (unix-seconds) is <= `now_unix_seconds`, in ascending
	/// score order, i.e. earliest-due first.
	pub fn index_due(&self, now_unix_seconds: i64) -> Result<Vec<Fik>, QueueError> {
		let members: Vec<String> = {
			let mut conn = self.connection()?;
			conn.zrangebyscore(TIME_INDEX_KEY, i64::MIN, now_unix_seconds)?
		};
		Ok(parse_members(members))
	}

	/// Removes a single FIK from the index. Returns the count actually removed (0 or 1);
	/// callers use this both to cancel a pending firing and, in the dispatch loop, to claim
	/// a firing before handing it off, so that two dispatchers racing on the same instant
	/// hand off at most once.
	pub fn index_remove(&self, fik: &Fik) -> Result<i64, QueueError> {
		let mut conn = self.connection()?;
		Ok(conn.zrem(TIME_INDEX_KEY, fik.as_member())?)
	}

	/// Removes every pending firing belonging to `schedule_id`, regardless of its scheduled
	/// instant. Used when a schedule is cancelled or disabled.
	pub fn index_remove_schedule(&self, schedule_id: &str) -> Result<i64, QueueError> {
		let prefix = Fik::prefix_for(schedule_id);
		let members = self.index_scan()?;
		let mut removed = 0i64;
		let mut conn = self.connection()?;
		for fik in members {
			if fik.as_member().starts_with(&prefix) {
				removed += conn.zrem::<_, _, i64>(TIME_INDEX_KEY, fik.as_member())?;
			}
		}
		Ok(removed)
	}

	/// Returns the full contents of the time index, sorted ascending by score. Used by the
	/// refill loop's full enumeration and the diagnostic `list_scheduled` control request.
	pub fn index_scan(&self) -> Result<Vec<Fik>, QueueError> {
		let members: Vec<String> = {
			let mut conn = self.connection()?;
			conn.zrange(TIME_INDEX_KEY, 0, -1)?
		};
		Ok(parse_members(members))
	}
}

/// Parses raw sorted-set members into FIKs, silently dropping any member that does not
/// parse. A malformed member can only get into the index through external tampering with
/// the Redis key; skipping it here is preferable to aborting the whole read.
fn parse_members(members: Vec<String>) -> Vec<Fik> {
	members.into_iter().filter_map(|m| m.parse().ok()).collect()
}

/// Hands a due firing off to the web application, which is responsible for materializing
/// and enqueueing the actual job. A non-2xx response or transport failure is reported back
/// to the caller (dispatch loop), which logs it without losing the claim already taken via
/// `index_remove`: the firing is dropped rather than retried within this cycle.
pub fn handoff_for_immediate_run(config: &AppConfig, schedule_id: &str) -> Result<(), HandoffError> {
	let url = format!("http://{}:{}/api/method/scheduler.enqueue_schedule", config.webserver_ip, config.webserver_port);

	debug!("Handing off schedule '{}' to {}", schedule_id, url);

	let mut request = ureq::post(&url)
		.set("Authorization", &config.webserver_token)
		.timeout(Duration::from_secs(HANDOFF_TIMEOUT_SECS));

	if let Some(host_header) = &config.webserver_host_header {
		request = request.set("Host", host_header);
	}

	let response = request.send_json(ureq::json!({ "task_schedule_key": schedule_id }));

	match response {
		Ok(resp) => {
			debug!("Handoff for schedule '{}' succeeded with status {}.", schedule_id, resp.status());
			Ok(())
		}
		Err(ureq::Error::Status(status, resp)) => {
			let body = resp.into_string().unwrap_or_default();
			warn!("Handoff for schedule '{}' failed with status {}: {}", schedule_id, status, body);
			Err(HandoffError::NonSuccessStatus { status, body })
		}
		Err(ureq::Error::Transport(transport)) => Err(HandoffError::Transport(transport.to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_members_drops_unparseable_entries_and_keeps_the_rest() {
		let raw = vec!["TS-1|100".to_owned(), "not-a-fik".to_owned(), "TS-2|200".to_owned(), "TS-3|".to_owned()];
		let fiks = parse_members(raw);

		assert_eq!(fiks.len(), 2);
		assert_eq!(fiks[0].schedule_id(), "TS-1");
		assert_eq!(fiks[0].unix_seconds(), 100);
		assert_eq!(fiks[1].schedule_id(), "TS-2");
		assert_eq!(fiks[1].unix_seconds(), 200);
	}
}
