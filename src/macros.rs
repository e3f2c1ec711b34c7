#![allow(unused_macros)]

/// Helper macro for locking items
///
/// Recovers from poisoning, the guarded buffers in this crate are append-only.
///
/// ```rust, ignore
///  let mut events = lock!(self.events);
///  events.push(event);
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    };
}
