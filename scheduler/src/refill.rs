// refill.rs
//
// Refill Loop (C6): periodically re-enumerates every enabled schedule from the store and
// pushes each schedule_id onto the internal work channel, so that schedules created or
// edited directly in the store (rather than through the control listener) still end up in
// the time index, and so that a crashed consumer cycle or a flushed Redis instance self-heals
// on the next refresh.

use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::store::ScheduleStore;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runs forever, checking once per `POLL_INTERVAL` whether `full_refresh_internal_secs` has
/// elapsed since the last full refill, and performing one if so. Intended to run on its own
/// thread for the lifetime of the daemon.
pub fn run(config: &AppConfig, store: &dyn ScheduleStore, outbox: &Sender<String>) {
	info!("Refill loop starting; full refresh every {}s.", config.full_refresh_internal_secs);

	let full_refresh_interval = Duration::from_secs(config.full_refresh_internal_secs as u64);
	let mut last_refresh = Instant::now() - full_refresh_interval;

	loop {
		if last_refresh.elapsed() >= full_refresh_interval {
			refill_once(store, outbox);
			last_refresh = Instant::now();
		}
		thread::sleep(POLL_INTERVAL);
	}
}

/// Performs one full refill pass, pushing every enabled schedule_id onto `outbox`. A store
/// error aborts only this pass; the loop tries again on its next scheduled refresh.
pub fn refill_once(store: &dyn ScheduleStore, outbox: &Sender<String>) {
	let schedule_ids = match store.list_enabled_schedule_ids() {
		Ok(ids) => ids,
		Err(e) => {
			warn!("Refill loop: could not enumerate enabled schedules: {}", e);
			return;
		}
	};

	info!("Refill loop: pushing {} enabled schedule(s) onto the internal work channel.", schedule_ids.len());

	for schedule_id in schedule_ids {
		if outbox.send(schedule_id).is_err() {
			warn!("Refill loop: internal work channel is closed; stopping this pass early.");
			return;
		}
	}
}
