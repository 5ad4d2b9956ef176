// dispatch.rs
//
// Dispatch Loop (C7): the only component that hands a due firing off to the web application.
// Each cycle it asks the time index for everything due by now, in ascending (earliest-first)
// order, and for each one: claims it by removing it from the index, skips the handoff if the
// schedule has since been disabled, performs the handoff, and finally pushes the schedule_id
// back onto the internal work channel so the consumer loop computes and indexes its next
// firing.
//
// Claiming via ZREM happens *before* the handoff call, not after. Two dispatch cycles racing
// on the same firing will see ZREM return 1 exactly once between them; whichever loses the
// race sees 0 and moves on without calling the web application a second time. This is the
// opposite order from systems that hand off first and record the claim afterward, which can
// double-dispatch a firing if the process dies between the two steps.

use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::fik::Fik;
use crate::queue::{self, JobQueue};
use crate::store::ScheduleStore;

/// Runs forever, performing one dispatch pass every `scheduler_polling_interval` seconds.
/// Intended to run on its own thread for the lifetime of the daemon, started only after an
/// initial delay to let the first refill/consumer pass populate the time index.
pub fn run(config: &AppConfig, store: &dyn ScheduleStore, queue: &JobQueue, outbox: &Sender<String>) {
	let poll_interval = Duration::from_secs(config.scheduler_polling_interval);
	info!("Dispatch loop starting; polling every {:?}.", poll_interval);

	loop {
		let started_at = Instant::now();

		if let Err(e) = dispatch_once(config, store, queue, outbox) {
			warn!("Dispatch loop: pass failed: {}", e);
		}

		let elapsed = started_at.elapsed();
		if elapsed < poll_interval {
			thread::sleep(poll_interval - elapsed);
		}
	}
}

/// Performs one dispatch pass. Returns an error only if the time index itself could not be
/// queried; per-firing failures (claim lost, store lookup failed, handoff failed) are logged
/// and do not abort the rest of the pass.
pub fn dispatch_once(config: &AppConfig, store: &dyn ScheduleStore, queue: &JobQueue, outbox: &Sender<String>) -> Result<(), String> {
	let now = Utc::now().timestamp();
	let due = queue.index_due(now).map_err(|e| e.to_string())?;

	if due.is_empty() {
		return Ok(());
	}

	info!("Dispatch loop: {} firing(s) due.", due.len());

	for fik in due {
		dispatch_one(config, store, queue, outbox, &fik);
	}

	Ok(())
}

fn dispatch_one(config: &AppConfig, store: &dyn ScheduleStore, queue: &JobQueue, outbox: &Sender<String>, fik: &Fik) {
	let claimed = match queue.index_remove(fik) {
		Ok(count) => count == 1,
		Err(e) => {
			error!("Dispatch loop: could not claim firing {}: {}", fik, e);
			return;
		}
	};

	if !claimed {
		// Lost the race to another dispatcher, or already cancelled. Nothing to do.
		return;
	}

	match store.fetch_schedule(fik.schedule_id()) {
		Ok(schedule) if schedule.enabled => {
			if let Err(e) = queue::handoff_for_immediate_run(config, fik.schedule_id()) {
				error!("Dispatch loop: handoff failed for schedule '{}': {}", fik.schedule_id(), e);
			}
		}
		Ok(_) => {
			info!("Dispatch loop: schedule '{}' is disabled; skipping handoff for claimed firing.", fik.schedule_id());
		}
		Err(e) => {
			error!("Dispatch loop: could not look up schedule '{}' after claiming its firing: {}", fik.schedule_id(), e);
		}
	}

	if outbox.send(fik.schedule_id().to_owned()).is_err() {
		warn!("Dispatch loop: internal work channel is closed; '{}' will not be rescheduled.", fik.schedule_id());
	}
}
