use std::time::{SystemTime, UNIX_EPOCH};

/// Millisecond epoch time, also used as the per-sender transaction
/// nonce. A `u64` is more than sufficient until the year 584942417.
pub type TimestampMillis = u64;

pub fn current_time_millis() -> TimestampMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the UNIX epoch")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_time_is_plausible() {
        let t = current_time_millis();
        // Sometime after 2021-01-01 and comfortably before the year 2200.
        assert!(t > 1_609_459_200_000);
        assert!(t < 7_258_118_400_000);
    }
}
