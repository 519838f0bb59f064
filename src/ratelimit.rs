//! Token-bucket limiter for fast-path log lines.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

const BURST: u32 = 10;
const REFILL_EVERY: Duration = Duration::from_secs(1);

struct State {
    tokens: u32,
    last_refill: Instant,
}

pub(crate) struct RateLimit {
    state: Mutex<State>,
}

impl RateLimit {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                tokens: BURST,
                last_refill: Instant::now(),
            }),
        }
    }

    /// True when the caller may emit a log line.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        if elapsed >= REFILL_EVERY {
            let refill = (elapsed.as_secs() as u32).min(BURST);
            state.tokens = (state.tokens + refill).min(BURST);
            state.last_refill = now;
        }
        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }
}
