//! Attendance session state machine.
//!
//! ```text
//! Idle ──begin_capture──▶ Capturing ──propose──▶ Proposing ──complete──▶ Capturing
//!   ▲                        │                       │
//!   └──────end_capture───────┴───────────────────────┘
//! ```
//!
//! Every `begin_capture`/`end_capture` bumps a generation counter. A
//! [`Ticket`] remembers the generation it was issued under, and
//! [`Session::complete`] refuses tickets from an older generation, so a
//! delayed emission that lands after stop never reaches the ledger.

use crate::course::CourseContext;
use crate::ledger::AttendanceLedger;
use crate::report::SessionSummary;
use crate::roster::{IdentitySource, Roster};
use crate::types::{BoundingBox, Identity, Outcome, PresenceRecord};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposeError {
    #[error("capture is not active")]
    NotCapturing,
    #[error("a detection is already in progress")]
    Busy,
    #[error("roster has no students to draw from")]
    EmptyRoster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Capturing,
    Proposing,
}

/// Handle for one in-flight proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    generation: u64,
    seq: u64,
}

/// A candidate identity waiting for its processing delay to expire.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub ticket: Ticket,
    pub identity: Identity,
    pub overlay: BoundingBox,
}

/// What happened when a proposal's delay expired.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Recorded { identity: Identity, outcome: Outcome },
    /// Capture stopped (or restarted) after the proposal was issued.
    Suppressed,
}

pub struct Session {
    id: Uuid,
    ledger: AttendanceLedger,
    course: Option<CourseContext>,
    capturing: bool,
    generation: u64,
    next_seq: u64,
    pending: Option<(Ticket, Identity)>,
    last_recognized: Option<Identity>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            ledger: AttendanceLedger::new(),
            course: None,
            capturing: false,
            generation: 0,
            next_seq: 0,
            pending: None,
            last_recognized: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> CaptureState {
        match (self.capturing, self.pending.is_some()) {
            (false, _) => CaptureState::Idle,
            (true, false) => CaptureState::Capturing,
            (true, true) => CaptureState::Proposing,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Course of the current (or most recent) capture.
    pub fn course(&self) -> Option<&CourseContext> {
        self.course.as_ref()
    }

    pub fn last_recognized(&self) -> Option<&Identity> {
        self.last_recognized.as_ref()
    }

    pub fn records(&self) -> &[PresenceRecord] {
        self.ledger.records()
    }

    pub fn present_count(&self) -> usize {
        self.ledger.len()
    }

    /// Enter `Capturing` for `course`. Any proposal from an earlier
    /// generation becomes stale.
    pub fn begin_capture(&mut self, course: CourseContext) {
        self.generation += 1;
        self.pending = None;
        self.capturing = true;
        tracing::debug!(session = %self.id, generation = self.generation, %course, "session capturing");
        self.course = Some(course);
    }

    /// Return to `Idle`, invalidating any in-flight proposal.
    ///
    /// Returns `false` if the session was already idle; calling it again has
    /// no further effect.
    pub fn end_capture(&mut self) -> bool {
        if !self.capturing {
            return false;
        }
        self.generation += 1;
        self.capturing = false;
        if let Some((ticket, identity)) = self.pending.take() {
            tracing::debug!(seq = ticket.seq, id = %identity.id, "pending proposal cancelled");
        }
        true
    }

    /// Draw a candidate and hold it as the single in-flight proposal.
    pub fn propose(
        &mut self,
        source: &mut dyn IdentitySource,
        roster: &Roster,
        frame_size: (u32, u32),
    ) -> Result<Proposal, ProposeError> {
        if !self.capturing {
            return Err(ProposeError::NotCapturing);
        }
        if self.pending.is_some() {
            return Err(ProposeError::Busy);
        }

        self.last_recognized = None;
        let identity = source.next(roster).ok_or(ProposeError::EmptyRoster)?;

        let ticket = Ticket {
            generation: self.generation,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.pending = Some((ticket, identity.clone()));

        Ok(Proposal {
            ticket,
            identity,
            overlay: BoundingBox::simulated(frame_size.0, frame_size.1),
        })
    }

    /// Deliver the proposal behind `ticket` to the ledger.
    ///
    /// The ticket must be the one currently pending and belong to the
    /// current generation; anything else is suppressed.
    pub fn complete(&mut self, ticket: Ticket, timestamp: DateTime<Utc>) -> Emission {
        let live = self.capturing
            && ticket.generation == self.generation
            && matches!(&self.pending, Some((t, _)) if *t == ticket);
        if !live {
            tracing::debug!(seq = ticket.seq, "stale proposal suppressed");
            return Emission::Suppressed;
        }

        let Some((_, identity)) = self.pending.take() else {
            return Emission::Suppressed;
        };
        let outcome = self.ledger.record(identity.clone(), timestamp);
        self.last_recognized = Some(identity.clone());
        Emission::Recorded { identity, outcome }
    }

    /// Clear the ledger. Capture state is untouched.
    pub fn reset(&mut self) {
        self.ledger.reset();
        self.last_recognized = None;
    }

    /// End the attendance episode: stop capturing, summarize the ledger for
    /// the dashboard and start over with a fresh session id.
    ///
    /// Returns `None` when no course was ever selected in this session.
    pub fn close(&mut self, roster_size: usize, date: NaiveDate) -> Option<SessionSummary> {
        self.end_capture();
        let course = self.course.take()?;

        let summary = SessionSummary::new(self.id, course, date, &self.ledger, roster_size);
        self.reset();
        self.id = Uuid::new_v4();
        Some(summary)
    }
}
