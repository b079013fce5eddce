//! History record

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// One persisted checkout event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Current time at the precision the datastore keeps (microseconds).
pub(crate) fn checkout_time() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_checkout_time_is_microsecond_precision() {
        let ts = checkout_time();
        assert_eq!(ts.nanosecond() % 1_000, 0);
        assert!(ts <= Utc::now());
    }
}
