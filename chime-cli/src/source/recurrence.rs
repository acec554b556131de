//! RRULE expansion for recurring events.
//!
//! Expands an RRULE anchored at the event's start into concrete instance
//! start times within a window.

use chrono::{DateTime, Duration, Utc};
use chime_core::error::{ChimeError, ChimeResult};
use rrule::RRuleSet;

/// Ceiling on generated instances per expansion.
const MAX_INSTANCES: u16 = 365;

/// Instance start times of `rule` (anchored at `start`) within
/// [range_start, range_end].
pub fn expand(
    start: DateTime<Utc>,
    rule: &str,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> ChimeResult<Vec<DateTime<Utc>>> {
    let rrule_str = format!(
        "DTSTART:{}\nRRULE:{}",
        start.format("%Y%m%dT%H%M%SZ"),
        rule
    );

    let rrule_set: RRuleSet = rrule_str
        .parse()
        .map_err(|e| ChimeError::Gateway(format!("Failed to parse RRULE '{rule}': {e}")))?;

    // Convert range boundaries to rrule's Tz type.
    // Shift by 1 second to make the range inclusive (after/before are exclusive).
    let tz: rrule::Tz = Utc.into();
    let after = (range_start - Duration::seconds(1)).with_timezone(&tz);
    let before = (range_end + Duration::seconds(1)).with_timezone(&tz);

    let result = rrule_set.after(after).before(before).all(MAX_INSTANCES);

    Ok(result
        .dates
        .iter()
        .map(|dt| dt.with_timezone(&Utc))
        .collect())
}
