//! Time formatting utilities.

use std::time::Duration;

/// Format a wait duration compactly ("58s", "2m 3s", "1h 5m").
#[must_use]
pub fn format_wait(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_seconds() {
        assert_eq!(format_wait(Duration::from_secs(58)), "58s");
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_wait(Duration::from_secs(123)), "2m 3s");
    }

    #[test]
    fn formats_hours() {
        assert_eq!(format_wait(Duration::from_secs(3900)), "1h 5m");
    }
}
