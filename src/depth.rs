use crate::InternalError;

/// Maximum message-call depth. Entering a call at this depth is refused.
pub const CALL_STACK_LIMIT: usize = 1024;

/// Message-call depth of the running transaction.
///
/// Scoped to one top-level transaction. Starts at zero, moves by one on every
/// call entry and exit, and must be back at zero when the transaction
/// completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallDepth(usize);

impl CallDepth {
    /// Instantiate a tracker at depth zero.
    pub const fn new() -> Self {
        Self(0)
    }

    /// The current depth. One while the top-level call runs.
    pub const fn depth(&self) -> usize {
        self.0
    }

    /// True if no call is in flight.
    pub const fn is_top_level(&self) -> bool {
        self.0 == 0
    }

    /// True if another call may be entered.
    pub const fn can_enter(&self) -> bool {
        self.0 < CALL_STACK_LIMIT
    }

    /// Record a call entry.
    pub const fn increment(&mut self) {
        self.0 += 1;
    }

    /// Record a call exit.
    pub const fn decrement(&mut self) -> Result<(), InternalError> {
        match self.0.checked_sub(1) {
            Some(depth) => {
                self.0 = depth;
                Ok(())
            }
            None => Err(InternalError::CallDepthUnderflow),
        }
    }

    /// Check that every entered call has exited.
    pub const fn ensure_balanced(&self) -> Result<(), InternalError> {
        if self.0 == 0 {
            Ok(())
        } else {
            Err(InternalError::UnbalancedCallDepth(self.0))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nested_calls_balance() {
        let mut depth = CallDepth::new();
        for expected in 1..=3 {
            depth.increment();
            assert_eq!(depth.depth(), expected);
        }
        for expected in (0..3).rev() {
            depth.decrement().unwrap();
            assert_eq!(depth.depth(), expected);
        }
        assert!(depth.ensure_balanced().is_ok());
    }

    #[test]
    fn underflow() {
        let mut depth = CallDepth::new();
        assert_eq!(depth.decrement(), Err(InternalError::CallDepthUnderflow));
        assert_eq!(depth.depth(), 0);
    }

    #[test]
    fn unbalanced_at_completion() {
        let mut depth = CallDepth::new();
        depth.increment();
        depth.increment();
        depth.decrement().unwrap();
        assert_eq!(depth.ensure_balanced(), Err(InternalError::UnbalancedCallDepth(1)));
    }

    #[test]
    fn limit() {
        let mut depth = CallDepth::new();
        for _ in 0..CALL_STACK_LIMIT {
            assert!(depth.can_enter());
            depth.increment();
        }
        assert!(!depth.can_enter());
    }
}
