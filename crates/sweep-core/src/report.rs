//! Human-readable run summary.
use std::{fmt, sync::Arc, time::Duration};

use sweep_model::RunOutcome;
use time::{OffsetDateTime, UtcOffset, macros::format_description};

type FormatFn = dyn Fn(OffsetDateTime) -> String + Send + Sync;

/// Display formatting of timestamps in notifications.
///
/// Only affects presentation; durations are always measured on the monotonic clock.
#[derive(Clone)]
pub struct TimestampFormatter(Arc<FormatFn>);

impl TimestampFormatter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(OffsetDateTime) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// `YYYY-MM-DD HH:MM:SS <label>` in a fixed offset.
    pub fn fixed_offset(offset: UtcOffset, label: impl Into<String>) -> Self {
        let label = label.into();
        Self::new(move |t| {
            let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
            let local = t.to_offset(offset);
            match local.format(fmt) {
                Ok(s) if label.is_empty() => s,
                Ok(s) => format!("{s} {label}"),
                Err(_) => local.to_string(),
            }
        })
    }

    pub fn utc() -> Self {
        Self::fixed_offset(UtcOffset::UTC, "UTC")
    }

    pub fn format(&self, t: OffsetDateTime) -> String {
        (self.0)(t)
    }
}

impl Default for TimestampFormatter {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Debug for TimestampFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TimestampFormatter").finish_non_exhaustive()
    }
}

/// Round to whole seconds (half away from zero) and render as `1h2m3s`.
pub fn humanize_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    if d.subsec_millis() >= 500 {
        secs += 1;
    }

    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}

/// Notification text for a completed run.
pub fn format_summary(outcome: &RunOutcome, formatter: &TimestampFormatter) -> String {
    format!(
        "🔄 Image cleanup completed on:\n\
         {host}\n\
         \n\
         ⏱ Time Information:\n\
         Started: {started}\n\
         Finished: {finished}\n\
         Duration: {duration}\n\
         \n\
         📊 Results:\n\
         🔹 Total: {total}\n\
         ✅ Removed: {removed}\n\
         ⏭ Skipped: {skipped}",
        host = outcome.host,
        started = formatter.format(outcome.started_at),
        finished = formatter.format(outcome.finished_at),
        duration = humanize_duration(outcome.duration),
        total = outcome.total,
        removed = outcome.removed,
        skipped = outcome.skipped,
    )
}
