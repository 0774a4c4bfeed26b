use std::sync::atomic::{AtomicUsize, Ordering};

/// Runs a closure when dropped, whichever way the scope is left
pub struct ScopeGuard<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> ScopeGuard<F> {
    pub fn new(f: F) -> Self {
        Self(Some(f))
    }
}

impl<F: FnOnce()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Count the current scope in `gauge` until the returned guard is dropped
pub fn count_scope(gauge: &'static AtomicUsize) -> ScopeGuard<impl FnOnce()> {
    gauge.fetch_add(1, Ordering::SeqCst);
    ScopeGuard::new(move || {
        gauge.fetch_sub(1, Ordering::SeqCst);
    })
}
