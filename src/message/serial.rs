use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

/// A thread safe source of message serials.
///
/// Serials start at 1, and zero is skipped when the counter wraps around.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::SerialCounter;
///
/// let serials = SerialCounter::new();
/// assert_eq!(serials.next().get(), 1);
/// assert_eq!(serials.next().get(), 2);
/// ```
#[derive(Debug)]
pub struct SerialCounter {
    next: AtomicU32,
}

impl SerialCounter {
    /// Construct a new counter.
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    #[cfg(test)]
    pub(crate) const fn starting_at(next: u32) -> Self {
        Self {
            next: AtomicU32::new(next),
        }
    }

    /// Allocate the next serial.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> NonZeroU32 {
        loop {
            if let Some(serial) = NonZeroU32::new(self.next.fetch_add(1, Ordering::Relaxed)) {
                return serial;
            }
        }
    }
}

impl Default for SerialCounter {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
