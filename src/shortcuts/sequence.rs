use std::time::{Duration, Instant};

/// Default inactivity window for chord sequences
pub const DEFAULT_SEQUENCE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Recently pressed keys plus the deadline after which they are forgotten.
///
/// There is exactly one pending deadline at a time: every push replaces it.
///
/// Once more than `max_len` keys are pending the buffer can no longer equal
/// any chord, so it only keeps the newest key (for single-key matching) and
/// stays overflowed until it is cleared or expires.
#[derive(Debug, Clone)]
pub struct SequenceBuffer {
    keys: Vec<String>,
    deadline: Option<Instant>,
    timeout: Duration,
    max_len: usize,
    overflowed: bool,
}

impl SequenceBuffer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            keys: Vec::new(),
            deadline: None,
            timeout,
            max_len: usize::MAX,
            overflowed: false,
        }
    }

    /// Cap the pending keys at the longest sequence that can still match
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(1);
        self
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// True when more keys arrived within the window than any chord has
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Append a key pressed at `now` and restart the inactivity window.
    ///
    /// An overflowed buffer holds only the newest key, so `keys()` never
    /// reports a sequence that could complete a chord.
    pub fn push(&mut self, key: &str, now: Instant) {
        self.expire(now);
        if self.overflowed {
            self.keys.clear();
        }
        self.keys.push(key.to_string());
        if self.keys.len() > self.max_len {
            self.keys.drain(..self.keys.len() - 1);
            self.overflowed = true;
        }
        self.deadline = Some(now + self.timeout);
    }

    /// Clear the buffer if its deadline has passed. Returns true if it did.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Drop all keys and cancel the pending deadline
    pub fn clear(&mut self) {
        self.keys.clear();
        self.deadline = None;
        self.overflowed = false;
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn last(&self) -> Option<&str> {
        self.keys.last().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the buffer resets, `None` if nothing is pending
    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

impl Default for SequenceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_TIMEOUT)
    }
}
