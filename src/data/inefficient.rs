//! Policy for operations whose traversal doesn't match the storage layout.
//!
//! Reducing the columns of a row-major matrix (or setting a row-major matrix
//! that must be stored column-major) works, but needs a copy or a strided
//! walk. The process-wide policy decides whether that is silently accepted,
//! logged, or an error.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{DafError, Result};

/// What to do when an operation is inefficient for the data layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InefficientActionPolicy {
    Ignore,
    Warn,
    Error,
}

impl InefficientActionPolicy {
    fn to_u8(self) -> u8 {
        match self {
            InefficientActionPolicy::Ignore => 0,
            InefficientActionPolicy::Warn => 1,
            InefficientActionPolicy::Error => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => InefficientActionPolicy::Ignore,
            2 => InefficientActionPolicy::Error,
            _ => InefficientActionPolicy::Warn,
        }
    }
}

static POLICY: AtomicU8 = AtomicU8::new(1);

/// The current process-wide policy (initially `Warn`).
pub fn inefficient_action_policy() -> InefficientActionPolicy {
    InefficientActionPolicy::from_u8(POLICY.load(Ordering::Relaxed))
}

/// Set the process-wide policy, returning the previous one.
pub fn set_inefficient_action_policy(policy: InefficientActionPolicy) -> InefficientActionPolicy {
    InefficientActionPolicy::from_u8(POLICY.swap(policy.to_u8(), Ordering::Relaxed))
}

/// Report an inefficient action according to the current policy.
pub fn inefficient_action(action: &str) -> Result<()> {
    match inefficient_action_policy() {
        InefficientActionPolicy::Ignore => Ok(()),
        InefficientActionPolicy::Warn => {
            tracing::warn!(action, "inefficient action");
            Ok(())
        }
        InefficientActionPolicy::Error => Err(DafError::InefficientAction {
            action: action.to_string(),
        }),
    }
}
