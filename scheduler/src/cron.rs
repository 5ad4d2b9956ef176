// cron.rs
//
// Clock & Cron Evaluator (C1): computes the next N UTC firing instants of a cron
// expression evaluated against a named IANA time zone.
//
// DST correctness: the `cron` crate only ever matches on calendar fields (second,
// minute, hour, day, month, weekday, year) -- it has no notion of "this candidate is
// ambiguous" or "this candidate does not exist". To get correct local-time semantics we
// seed the iterator with a fake UTC instant whose *naive* fields equal the caller's
// real local wall-clock fields, let the crate advance purely on calendar arithmetic, and
// then reinterpret each candidate's naive fields as local wall-clock time in the real
// zone via `Tz::from_local_datetime`. That call tells us, per candidate, whether the
// local instant is ordinary (`Single`), was skipped by a spring-forward transition
// (`None`), or occurred twice due to a fall-back transition (`Ambiguous`).

use std::str::FromStr;

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tracing::{debug, trace, warn};

use crate::errors::CronError;

/// How far into the future we'll search for a firing before giving up.
const SEARCH_HORIZON_DAYS: i64 = 366;

#[derive(Debug)]
struct CronStruct {
	second: Option<String>,
	minute: Option<String>,
	hour: Option<String>,
	day_of_month: Option<String>,
	month: Option<String>,
	day_of_week: Option<String>,
	year: Option<String>,
}

impl CronStruct {
	fn to_string(&self) -> String {
		let wildcard = "*".to_owned();
		format!(
			"{} {} {} {} {} {} {}",
			self.second.as_ref().unwrap_or(&wildcard),
			self.minute.as_ref().unwrap_or(&wildcard),
			self.hour.as_ref().unwrap_or(&wildcard),
			self.day_of_month.as_ref().unwrap_or(&wildcard),
			self.month.as_ref().unwrap_or(&wildcard),
			self.day_of_week.as_ref().unwrap_or(&wildcard),
			self.year.as_ref().unwrap_or(&wildcard)
		)
	}
}

impl FromStr for CronStruct {
	type Err = CronError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		fn nonwildcard_or_none(element: &str) -> Option<String> {
			if element == "*" {
				None
			} else {
				Some(element.to_owned())
			}
		}

		let cron7 = cron_str_to_cron_str7(s)?;
		let fields: Vec<&str> = cron7.split(' ').collect();

		Ok(CronStruct {
			second: nonwildcard_or_none(fields[0]),
			minute: nonwildcard_or_none(fields[1]),
			hour: nonwildcard_or_none(fields[2]),
			day_of_month: nonwildcard_or_none(fields[3]),
			month: nonwildcard_or_none(fields[4]),
			day_of_week: nonwildcard_or_none(fields[5]),
			year: nonwildcard_or_none(fields[6]),
		})
	}
}

/// Given a cron string of 5, 6 or 7 elements, transform it into a 7-element cron string.
///
/// There is no universal standard for cron strings; they commonly carry 5-7 elements.
/// The `cron` crate requires exactly 7 (seconds through year).
pub fn cron_str_to_cron_str7(cron_expression_string: &str) -> Result<String, CronError> {
	let vec: Vec<&str> = cron_expression_string.trim().split_whitespace().collect();

	match vec.len() {
		5 => Ok(format!("0 {} *", cron_expression_string)),
		6 => Ok(format!("0 {}", cron_expression_string)),
		7 => Ok(cron_expression_string.to_owned()),
		found => Err(CronError::WrongQtyOfElements { found }),
	}
}

/// Parse a zone name into a `chrono_tz::Tz`, mapping failure onto `CronError::UnknownZone`.
pub fn resolve_zone(zone_name: &str) -> Result<Tz, CronError> {
	zone_name.parse().map_err(|_| CronError::UnknownZone { zone: zone_name.to_owned() })
}

/// Compute up to `n` distinct UTC instants, strictly after `from_utc`, at which
/// `cron_expression` (evaluated in `zone`) fires.
pub fn next_runtimes(
	cron_expression: &str,
	zone: Tz,
	from_utc: Option<DateTime<Utc>>,
	n: usize,
) -> Result<Vec<DateTime<Utc>>, CronError> {
	let cron_struct: CronStruct = cron_expression.parse()?;
	let schedule = Schedule::from_str(&cron_struct.to_string()).map_err(|_| CronError::InvalidExpression)?;

	let from_utc = from_utc.unwrap_or_else(Utc::now);
	let from_local_naive = from_utc.with_timezone(&zone).naive_local();

	// A DateTime<Utc> whose naive fields are actually the caller's local wall-clock fields.
	// The `cron` crate only inspects naive calendar fields, so this lets it step forward
	// in *local* time while we still hold a `DateTime<Utc>` to iterate with.
	let fake_seed: DateTime<Utc> = Utc.from_utc_datetime(&from_local_naive);
	let fake_horizon: DateTime<Utc> = fake_seed + Duration::days(SEARCH_HORIZON_DAYS);

	let mut results: Vec<DateTime<Utc>> = Vec::with_capacity(n);

	for candidate_fake_utc in schedule.after(&fake_seed) {
		if candidate_fake_utc > fake_horizon {
			break;
		}
		let candidate_local_naive: NaiveDateTime = candidate_fake_utc.naive_utc();

		match zone.from_local_datetime(&candidate_local_naive) {
			LocalResult::Single(local_dt) => {
				results.push(local_dt.with_timezone(&Utc));
			}
			LocalResult::Ambiguous(earliest, _latest) => {
				// Fall-back transition: the same wall-clock instant occurs twice.
				// Emit it once, using the earliest (pre-transition) occurrence.
				debug!("Local instant {} is ambiguous in {}; using earliest occurrence.", candidate_local_naive, zone);
				results.push(earliest.with_timezone(&Utc));
			}
			LocalResult::None => {
				// Spring-forward transition: this local instant never happened. Skip it.
				trace!("Local instant {} does not exist in {}; skipping.", candidate_local_naive, zone);
				continue;
			}
		}
		if results.len() >= n {
			break;
		}
	}

	if results.is_empty() {
		warn!("Cron expression '{}' in zone {} produced no firings within {} days.", cron_expression, zone, SEARCH_HORIZON_DAYS);
		return Err(CronError::NoFutureFiring);
	}
	Ok(results)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone as _;

	#[test]
	fn cron7_rejects_wrong_element_count() {
		assert_eq!(cron_str_to_cron_str7("* *"), Err(CronError::WrongQtyOfElements { found: 2 }));
	}

	#[test]
	fn cron7_pads_5_element_expression() {
		assert_eq!(cron_str_to_cron_str7("30 2 * * *").unwrap(), "0 30 2 * * * *");
	}

	#[test]
	fn cron7_passes_through_7_element_expression() {
		assert_eq!(cron_str_to_cron_str7("0 30 2 * * * *").unwrap(), "0 30 2 * * * *");
	}

	#[test]
	fn next_runtime_is_strictly_after_from_utc() {
		let zone: Tz = "UTC".parse().unwrap();
		let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 10).unwrap();
		let result = next_runtimes("* * * * *", zone, Some(from), 1).unwrap();
		assert!(result[0] > from);
	}

	#[test]
	fn dst_spring_forward_is_skipped_and_fall_back_handled_elsewhere() {
		// America/New_York, 2025-03-09 springs forward at 02:00 local -> 03:00 local.
		// Firing "30 2 * * *" has no 02:30 local instant that day; it must be skipped
		// entirely, landing on the following day's 02:30 instead.
		let zone: Tz = "America/New_York".parse().unwrap();
		let from = Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap();
		let results = next_runtimes("30 2 * * *", zone, Some(from), 2).unwrap();

		assert_eq!(results[0], Utc.with_ymd_and_hms(2025, 3, 8, 7, 30, 0).unwrap());
		assert_eq!(results[1], Utc.with_ymd_and_hms(2025, 3, 10, 6, 30, 0).unwrap());
	}

	#[test]
	fn unknown_zone_is_an_error() {
		assert!(resolve_zone("Not/A_Zone").is_err());
	}
}
