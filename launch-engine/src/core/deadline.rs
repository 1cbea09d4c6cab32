use chrono::{DateTime, Utc};
use std::time::Duration;

/// A point in wall-clock time after which an operation must give up.
///
/// Wall-clock rather than `Instant` so a deadline derived from a reservation
/// timestamp means the same thing in every process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    expires_at: DateTime<Utc>,
}

impl Deadline {
    pub fn at(expires_at: DateTime<Utc>) -> Self {
        Self { expires_at }
    }

    pub fn after(duration: Duration) -> Self {
        Self::at(offset(Utc::now(), duration))
    }

    /// Deadline of a window opened at `started_at`; an unknown start is already expired
    pub fn from_start(started_at: Option<DateTime<Utc>>, window: Duration) -> Self {
        match started_at {
            Some(start) => Self::at(offset(start, window)),
            None => Self::at(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn epoch_millis(&self) -> i64 {
        self.expires_at.timestamp_millis()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left, zero once expired
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// The earlier of two deadlines
    pub fn earlier(self, other: Deadline) -> Deadline {
        std::cmp::min(self, other)
    }
}

fn offset(start: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| start.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_from_start() {
        let start = Utc::now() - chrono::Duration::seconds(31);
        assert!(Deadline::from_start(Some(start), Duration::from_secs(30)).is_expired());

        let start = Utc::now();
        let deadline = Deadline::from_start(Some(start), Duration::from_secs(30));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() <= Duration::from_secs(30));
        assert_eq!(deadline.epoch_millis(), (start + chrono::Duration::seconds(30)).timestamp_millis());
    }

    #[test]
    fn test_unknown_start_is_expired() {
        let deadline = Deadline::from_start(None, Duration::from_secs(30));
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_earlier_picks_first_expiry() {
        let short = Deadline::after(Duration::from_secs(1));
        let long = Deadline::after(Duration::from_secs(60));
        assert_eq!(short.earlier(long), short);
        assert_eq!(long.earlier(short), short);
    }
}
