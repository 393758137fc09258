use anyhow::Result;
use std::time::{SystemTime, UNIX_EPOCH};

/// Return the current Unix epoch in seconds.
pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Render an epoch timestamp as `Mon DD YYYY at HH:MM UTC`, or `unknown` when out of range.
pub fn format_epoch_utc(epoch_secs: i64) -> String {
    match chrono::DateTime::from_timestamp(epoch_secs, 0) {
        Some(dt) => dt.format("%b %d %Y at %H:%M UTC").to_string(),
        None => "unknown".to_string(),
    }
}

pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_epoch_utc_renders_fixed_layout() {
        assert_eq!(format_epoch_utc(0), "Jan 01 1970 at 00:00 UTC");
        assert_eq!(format_epoch_utc(1_574_096_400), "Nov 18 2019 at 17:00 UTC");
    }

    #[test]
    fn plural_handles_singular() {
        assert_eq!(plural(1, "topic"), "1 topic");
        assert_eq!(plural(5, "message"), "5 messages");
    }
}
