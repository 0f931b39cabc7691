//! Scoped capture of unexpected failures (panics) for the duration of a run.
//!
//! [`FailureGuard`] swaps in a panic hook on construction and puts the
//! previous hook back on [`Drop`], so the capture cannot outlive the run that
//! installed it, whether the run succeeds, fails, or unwinds. Only panics
//! raised on the installing thread are captured; panics elsewhere in the
//! process go straight to the previous hook. At most one thread holds guards
//! at a time: installing a guard on another thread blocks until the first is
//! dropped. Guards nested on one thread restore hooks in reverse order.

use std::panic::{self, PanicHookInfo};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, const_reentrant_mutex};

type PanicHook = dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static;

static HOOK_OWNER: ReentrantMutex<()> = const_reentrant_mutex(());

/// A panic observed while the guard was held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFailure {
    /// Panic payload text.
    pub message: String,
    /// `file:line:column` of the panic site, when known.
    pub location: Option<String>,
}

/// RAII guard owning the process panic hook while a run is in flight.
pub struct FailureGuard {
    captured: Arc<Mutex<Option<CapturedFailure>>>,
    previous: Arc<PanicHook>,
    _exclusive: ReentrantMutexGuard<'static, ()>,
}

impl FailureGuard {
    /// Install the capturing hook. The current hook is kept and restored on drop.
    #[must_use]
    pub fn install() -> Self {
        let exclusive = HOOK_OWNER.lock();
        let previous: Arc<PanicHook> = Arc::from(panic::take_hook());
        let captured = Arc::new(Mutex::new(None));
        let owner = thread::current().id();

        let slot = Arc::clone(&captured);
        let forward = Arc::clone(&previous);
        panic::set_hook(Box::new(move |info| {
            if !capture_on(owner, &slot, info) {
                forward(info);
            }
        }));

        Self {
            captured,
            previous,
            _exclusive: exclusive,
        }
    }

    /// Take the captured failure, if any.
    pub fn take(&self) -> Option<CapturedFailure> {
        self.captured.lock().take()
    }
}

impl Drop for FailureGuard {
    fn drop(&mut self) {
        let _ = panic::take_hook();
        let previous = Arc::clone(&self.previous);
        panic::set_hook(Box::new(move |info| previous(info)));
    }
}

fn capture_on(
    owner: ThreadId,
    slot: &Mutex<Option<CapturedFailure>>,
    info: &PanicHookInfo<'_>,
) -> bool {
    if thread::current().id() != owner {
        return false;
    }
    let failure = CapturedFailure {
        message: payload_message(info.payload()),
        location: info.location().map(ToString::to_string),
    };
    let mut guard = slot.lock();
    // Keep the first panic; a second one during unwinding is a consequence.
    if guard.is_none() {
        *guard = Some(failure);
    }
    true
}

/// Best-effort text of a panic payload.
#[must_use]
pub fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown failure".to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Hook swapping for tests that check what a run leaves behind.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Run `body` with a counting hook installed as the process panic hook.
    ///
    /// Returns the body's result and how many panics on this thread reached
    /// the counting hook. Panics from other threads are forwarded to the hook
    /// that was in place before. The hook lock is held throughout, so no
    /// guard on another thread can interleave.
    pub(crate) fn with_counting_hook<R>(body: impl FnOnce() -> R) -> (R, usize) {
        let _exclusive = HOOK_OWNER.lock();
        let previous: Arc<PanicHook> = Arc::from(panic::take_hook());
        let hits = Arc::new(AtomicUsize::new(0));
        let owner = thread::current().id();

        let counter = Arc::clone(&hits);
        let forward = Arc::clone(&previous);
        panic::set_hook(Box::new(move |info| {
            if thread::current().id() == owner {
                counter.fetch_add(1, Ordering::SeqCst);
            } else {
                forward(info);
            }
        }));

        let result = body();

        let _ = panic::take_hook();
        panic::set_hook(Box::new(move |info| previous(info)));
        (result, hits.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::with_counting_hook;
    use super::*;
    use std::panic::AssertUnwindSafe;

    #[test]
    fn captures_panic_message_on_owner_thread() {
        let guard = FailureGuard::install();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            panic!("boom in sink");
        }));
        assert!(result.is_err());
        let captured = guard.take().unwrap();
        assert_eq!(captured.message, "boom in sink");
        assert!(captured.location.unwrap().contains("failure_guard.rs"));
        assert!(guard.take().is_none());
    }

    #[test]
    fn formatted_payload_is_captured() {
        let guard = FailureGuard::install();
        let code = 7;
        let _ = panic::catch_unwind(|| panic!("exit code {code}"));
        assert_eq!(guard.take().unwrap().message, "exit code 7");
    }

    #[test]
    fn other_threads_are_not_captured() {
        let guard = FailureGuard::install();
        let handle = thread::spawn(|| panic!("elsewhere"));
        assert!(handle.join().is_err());
        assert!(guard.take().is_none());
    }

    #[test]
    fn nothing_captured_without_panic() {
        let guard = FailureGuard::install();
        assert!(guard.take().is_none());
    }

    #[test]
    fn dropped_guard_hands_panics_back_to_previous_hook() {
        let (captured, hits) = with_counting_hook(|| {
            let guard = FailureGuard::install();
            let _ = panic::catch_unwind(|| panic!("inside the guard"));
            let captured = guard.take();
            drop(guard);
            let _ = panic::catch_unwind(|| panic!("after the guard"));
            captured
        });
        assert_eq!(captured.unwrap().message, "inside the guard");
        assert_eq!(hits, 1);
    }

    #[test]
    fn nested_guards_restore_in_reverse_order() {
        let (outer_message, hits) = with_counting_hook(|| {
            let outer = FailureGuard::install();
            {
                let inner = FailureGuard::install();
                let _ = panic::catch_unwind(|| panic!("inner"));
                assert_eq!(inner.take().unwrap().message, "inner");
            }
            let _ = panic::catch_unwind(|| panic!("outer"));
            let outer_captured = outer.take().map(|c| c.message);
            drop(outer);
            outer_captured
        });
        assert_eq!(outer_message.as_deref(), Some("outer"));
        assert_eq!(hits, 0);
    }

    #[test]
    fn payload_message_handles_non_string() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(payload_message(payload.as_ref()), "unknown failure");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(payload_message(payload.as_ref()), "owned");
    }
}
