//! rollcall-core — Attendance session model.
//!
//! Holds the roster, the deduplicating attendance ledger and the
//! capture/propose/record state machine that drives simulated recognition.

pub mod course;
pub mod enrollment;
pub mod ledger;
pub mod report;
pub mod roster;
pub mod session;
pub mod types;

pub use course::{Catalog, CourseContext, ValidationError};
pub use ledger::AttendanceLedger;
pub use report::{AttendanceHistory, CourseReport, SessionSummary};
pub use roster::{IdentitySource, RandomDraw, Roster, ScriptedDraw};
pub use session::{CaptureState, Emission, Proposal, ProposeError, Session, Ticket};
pub use types::{BoundingBox, Identity, Outcome, PresenceRecord};
