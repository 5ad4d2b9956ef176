// fik.rs
//
// A Firing Instance Key (FIK) is the member (and score) of the Redis time index:
// "<schedule_id>|<unix_seconds>". Embedding the timestamp into the member, rather than
// using the schedule_id alone, lets multiple pending firings of the same schedule coexist
// and makes cancellation by prefix match idempotent.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::StringError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fik {
	schedule_id: String,
	unix_seconds: i64,
}

impl Fik {
	pub fn new(schedule_id: impl Into<String>, unix_seconds: i64) -> Self {
		Fik {
			schedule_id: schedule_id.into(),
			unix_seconds,
		}
	}

	pub fn schedule_id(&self) -> &str {
		&self.schedule_id
	}

	pub fn unix_seconds(&self) -> i64 {
		self.unix_seconds
	}

	pub fn fire_at_utc(&self) -> Option<DateTime<Utc>> {
		NaiveDateTime::from_timestamp_opt(self.unix_seconds, 0).map(|naive| DateTime::<Utc>::from_utc(naive, Utc))
	}

	/// The prefix used to match every FIK belonging to a given schedule, for cancellation.
	pub fn prefix_for(schedule_id: &str) -> String {
		format!("{}|", schedule_id)
	}

	pub fn as_member(&self) -> String {
		self.to_string()
	}
}

impl fmt::Display for Fik {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}|{}", self.schedule_id, self.unix_seconds)
	}
}

impl std::str::FromStr for Fik {
	type Err = StringError;

	fn from_str(member: &str) -> Result<Self, Self::Err> {
		let (schedule_id, unix_seconds_str) = member
			.rsplit_once('|')
			.ok_or_else(|| StringError::MalformedFik { found: member.to_owned() })?;
		let unix_seconds: i64 = unix_seconds_str
			.parse()
			.map_err(|_| StringError::MalformedFik { found: member.to_owned() })?;
		Ok(Fik {
			schedule_id: schedule_id.to_owned(),
			unix_seconds,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trip_parse_and_make() {
		let fik = Fik::new("TS-000003", 1_735_689_660);
		let member = fik.as_member();
		let parsed: Fik = member.parse().unwrap();
		assert_eq!(parsed.schedule_id(), "TS-000003");
		assert_eq!(parsed.unix_seconds(), 1_735_689_660);
	}

	#[test]
	fn rejects_malformed_member() {
		let result: Result<Fik, _> = "no-pipe-here".parse();
		assert!(result.is_err());
	}

	#[test]
	fn prefix_matches_own_members_only() {
		let fik = Fik::new("TS-000003", 100);
		assert!(fik.as_member().starts_with(&Fik::prefix_for("TS-000003")));
		assert!(!fik.as_member().starts_with(&Fik::prefix_for("TS-0000031")));
	}
}
