//! Wall-clock port, so cache ages can be tested with a simulated clock.

use chrono::{DateTime, Utc};

pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
