// consumer.rs
//
// Consumer Loop (C5): the sole reader of the internal work channel. For each schedule_id
// received, it fetches the schedule's current definition, computes its next firing instant,
// and upserts the resulting FIK into the time index. Store and queue errors are logged and
// swallowed -- a single bad schedule must never bring down the loop that services every
// other schedule.

use std::sync::mpsc::Receiver;

use chrono_tz::Tz;
use tracing::{info, warn};

use crate::cron;
use crate::fik::Fik;
use crate::queue::JobQueue;
use crate::store::ScheduleStore;

/// Drains `inbox` until every `Sender` is dropped and the channel closes. Intended to run on
/// its own thread for the lifetime of the daemon.
pub fn run(inbox: Receiver<String>, store: &dyn ScheduleStore, queue: &JobQueue) {
	info!("Consumer loop starting.");

	for schedule_id in inbox.iter() {
		if let Err(e) = process_one(&schedule_id, store, queue) {
			warn!("Consumer loop: skipping schedule '{}': {}", schedule_id, e);
		}
	}

	info!("Consumer loop exiting: internal work channel closed.");
}

fn process_one(schedule_id: &str, store: &dyn ScheduleStore, queue: &JobQueue) -> Result<(), String> {
	let schedule = store.fetch_schedule(schedule_id).map_err(|e| e.to_string())?;

	if !schedule.enabled {
		let removed = queue.index_remove_schedule(schedule_id).map_err(|e| e.to_string())?;
		if removed > 0 {
			info!("Schedule '{}' is disabled; removed {} pending firing(s).", schedule_id, removed);
		}
		return Ok(());
	}

	let zone: Tz = cron::resolve_zone(&schedule.cron_timezone).map_err(|e| e.to_string())?;
	let next_firings = cron::next_runtimes(&schedule.cron_string, zone, None, 1).map_err(|e| e.to_string())?;
	let next_firing = next_firings[0];

	let fik = Fik::new(schedule.schedule_id.clone(), next_firing.timestamp());
	let inserted = queue.index_upsert(&fik).map_err(|e| e.to_string())?;

	if inserted {
		info!("Scheduled '{}' to fire at {} ({}).", schedule_id, next_firing, fik);
	} else {
		debug_log_already_indexed(schedule_id, &fik);
	}

	Ok(())
}

fn debug_log_already_indexed(schedule_id: &str, fik: &Fik) {
	tracing::debug!("Schedule '{}' was already indexed at firing instant {}.", schedule_id, fik.unix_seconds());
}
