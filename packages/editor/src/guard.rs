//! Scoped suppression of snapshot recording.
//!
//! Replaying history can trigger side effects that call back into the
//! editing API. Those calls must not record new entries, or undo history
//! corrupts itself. [`SnapshotSuppression`] turns recording off for its
//! lifetime and restores the previous setting when dropped, including on
//! early return or unwinding.

use std::ops::{Deref, DerefMut};

/// Anything whose snapshot recording can be switched on and off
pub trait RecordingSwitch {
    /// Enable or disable recording, returning the previous setting
    fn enable_snapshot(&mut self, enable: bool) -> bool;
}

/// Guard that keeps recording disabled until dropped
pub struct SnapshotSuppression<'a, T: RecordingSwitch> {
    target: &'a mut T,
    previous: bool,
}

impl<'a, T: RecordingSwitch> SnapshotSuppression<'a, T> {
    pub fn new(target: &'a mut T) -> Self {
        let previous = target.enable_snapshot(false);
        Self { target, previous }
    }
}

impl<T: RecordingSwitch> Deref for SnapshotSuppression<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.target
    }
}

impl<T: RecordingSwitch> DerefMut for SnapshotSuppression<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.target
    }
}

impl<T: RecordingSwitch> Drop for SnapshotSuppression<'_, T> {
    fn drop(&mut self) {
        self.target.enable_snapshot(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Switch {
        enabled: bool,
    }

    impl RecordingSwitch for Switch {
        fn enable_snapshot(&mut self, enable: bool) -> bool {
            std::mem::replace(&mut self.enabled, enable)
        }
    }

    #[test]
    fn test_restores_previous_state() {
        let mut switch = Switch { enabled: true };
        {
            let guard = SnapshotSuppression::new(&mut switch);
            assert!(!guard.enabled);
        }
        assert!(switch.enabled);
    }

    #[test]
    fn test_nested_guards_restore_in_order() {
        let mut switch = Switch { enabled: true };
        {
            let mut outer = SnapshotSuppression::new(&mut switch);
            {
                let inner = SnapshotSuppression::new(&mut *outer);
                assert!(!inner.enabled);
            }
            assert!(!outer.enabled);
        }
        assert!(switch.enabled);
    }

    #[test]
    fn test_restores_on_unwind() {
        let mut switch = Switch { enabled: true };
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = SnapshotSuppression::new(&mut switch);
            panic!("replay failed");
        }));
        assert!(result.is_err());
        assert!(switch.enabled);
    }
}
