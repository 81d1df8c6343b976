use chrono::{DateTime, TimeZone, Utc};

/// Source of "now" for reading timestamps and aggregation windows.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
pub use manual::ManualClock;

#[cfg(test)]
mod manual {
    use std::sync::atomic::{AtomicI64, Ordering};

    use chrono::{DateTime, Utc};

    use super::{from_ms, Clock};

    /// Clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        ms: AtomicI64,
    }

    impl ManualClock {
        pub fn at(rfc3339: &str) -> Self {
            let start = DateTime::parse_from_rfc3339(rfc3339).unwrap();
            Self {
                ms: AtomicI64::new(start.timestamp_millis()),
            }
        }

        pub fn advance_secs(&self, secs: i64) {
            self.ms.fetch_add(secs * 1000, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            from_ms(self.ms.load(Ordering::SeqCst))
        }
    }
}
