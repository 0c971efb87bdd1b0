use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Last value handed out by [`now_milli`]
static LAST_MILLI: AtomicI64 = AtomicI64::new(0);

/// Current time in milliseconds since the unix epoch.
///
/// Never decreases even if the wall clock steps backwards, so timestamps
/// written by consecutive operations always compare consistently.
pub fn now_milli() -> i64 {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0);

    let mut last = LAST_MILLI.load(Ordering::Relaxed);
    loop {
        let next = wall.max(last);
        match LAST_MILLI.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod test {
    use super::now_milli;

    #[test]
    fn test_monotonic() {
        let mut previous = now_milli();
        for _ in 0..1000 {
            let value = now_milli();
            assert!(value >= previous);
            previous = value;
        }
    }
}
