//! Single-flight guard for render requests.
//!
//! At most one render runs at a time; a second request while one is in
//! flight is rejected, not queued. The flag is cleared when the ticket is
//! dropped, whether the render succeeded, failed or was abandoned.

use sigdoc_core::{Error, Result, SessionId};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub struct RenderGate {
    busy: Rc<Cell<bool>>,
}

impl RenderGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub fn try_begin(&self, session: SessionId) -> Result<RenderTicket> {
        if self.busy.replace(true) {
            log::debug!("render rejected for {session}: already in flight");
            return Err(Error::RenderInFlight);
        }
        Ok(RenderTicket {
            busy: Rc::clone(&self.busy),
            session,
        })
    }
}

/// Proof that a render is running. Hold it for the whole render.
#[derive(Debug)]
pub struct RenderTicket {
    busy: Rc<Cell<bool>>,
    session: SessionId,
}

impl RenderTicket {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Release the gate and hand back `result` if it still belongs to
    /// `current`. A result for a session the user already left is dropped.
    pub fn resolve<T>(self, current: SessionId, result: Result<T>) -> Option<Result<T>> {
        if current == self.session {
            Some(result)
        } else {
            log::debug!("dropping render result of {} (now {current})", self.session);
            None
        }
    }
}

impl Drop for RenderTicket {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_request_is_rejected_until_first_resolves() {
        let gate = RenderGate::new();
        let session = SessionId::next();
        let ticket = gate.try_begin(session).unwrap();
        assert_eq!(gate.try_begin(session).unwrap_err(), Error::RenderInFlight);

        let out = ticket.resolve(session, Ok(42));
        assert_eq!(out, Some(Ok(42)));
        assert!(!gate.is_busy());
        assert!(gate.try_begin(session).is_ok());
    }

    #[test]
    fn failure_also_releases() {
        let gate = RenderGate::new();
        let session = SessionId::next();
        {
            let ticket = gate.try_begin(session).unwrap();
            let _ = ticket.resolve::<()>(session, Err(Error::Render("boom".into())));
        }
        assert!(!gate.is_busy());
    }

    #[test]
    fn stale_results_are_dropped() {
        let gate = RenderGate::new();
        let old = SessionId::next();
        let ticket = gate.try_begin(old).unwrap();
        assert_eq!(ticket.resolve(SessionId::next(), Ok(())), None);
        assert!(!gate.is_busy());
    }
}
