//! "On error raised" observers
//!
//! The authentication service notifies every registered [`AuthErrorHook`] once
//! per rejection, in both raising and non-raising modes. Hooks are how an
//! application attaches tracing spans, metrics or audit records to failed
//! authentications without the error types reaching into global state.

use std::sync::Arc;

use tracing::warn;

use crate::error::AuthRejection;

/// Observer notified for every authentication rejection
pub trait AuthErrorHook: Send + Sync {
    /// Called once per rejection, before it is raised or recorded
    fn on_error(&self, rejection: &AuthRejection);
}

impl<F> AuthErrorHook for F
where
    F: Fn(&AuthRejection) + Send + Sync,
{
    fn on_error(&self, rejection: &AuthRejection) {
        self(rejection)
    }
}

/// Shared hook handle
pub type SharedErrorHook = Arc<dyn AuthErrorHook>;

/// Hook that emits a `tracing` warning for each rejection
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorHook;

impl AuthErrorHook for TracingErrorHook {
    fn on_error(&self, rejection: &AuthRejection) {
        warn!(
            status = %rejection.status(),
            detail = %rejection.detail(),
            "JWT bearer authentication rejected"
        );
    }
}
