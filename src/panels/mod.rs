//! Per-page view-state controllers.
//!
//! Each panel owns its state and talks to the screen only through its own
//! rendering port, so it runs the same against GTK widgets and test doubles.
//! Fetches are split into `begin_*` (state change + request token) and
//! `apply_*` (result delivery) so a front end can run the request elsewhere
//! and hand the result back later; the async helpers chain the two.

pub mod booking;
pub mod conversation;
pub mod directory;
pub mod profile;
pub mod sessions;

use log::warn;

/// Issues monotonically increasing tokens for one kind of request on one panel.
/// Only a response carrying the most recent token may touch the panel.
#[derive(Debug, Default)]
pub struct RequestGuard {
    issued: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestGuard {
    pub fn issue(&mut self) -> RequestToken {
        self.issued += 1;
        RequestToken(self.issued)
    }

    /// Makes every outstanding token stale without starting a new request.
    pub fn invalidate(&mut self) {
        self.issued += 1;
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.issued
    }

    pub(crate) fn accept(&self, token: RequestToken, what: &str) -> bool {
        let current = self.is_current(token);
        if !current {
            warn!("discarding stale {what} response (token {} < {})", token.0, self.issued);
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_latest_token_is_current() {
        let mut guard = RequestGuard::default();
        let a = guard.issue();
        let b = guard.issue();
        assert!(a < b);
        assert!(!guard.is_current(a));
        assert!(guard.is_current(b));
        guard.invalidate();
        assert!(!guard.is_current(b));
    }
}
