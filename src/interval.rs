//! Pass interval parsing.

use anyhow::Context;
use std::time::Duration;

/// Parse an interval like "15m", "900s", "1h" or "900".
///
/// A plain number is taken as seconds.
pub fn parse_interval(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty interval");
    }

    let (digits, unit_secs) = if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else if let Some(minutes) = s.strip_suffix('m') {
        (minutes, 60)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else {
        (s, 1)
    };

    let value: u64 = digits
        .trim()
        .parse()
        .with_context(|| format!("Invalid interval value: {s}"))?;
    let secs = value
        .checked_mul(unit_secs)
        .with_context(|| format!("Interval too large: {s}"))?;
    Ok(Duration::from_secs(secs))
}
