//! Attendance history and per-course dashboard statistics.

use crate::course::CourseContext;
use crate::ledger::AttendanceLedger;
use crate::roster::Roster;
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// Archived result of one closed attendance session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub course: CourseContext,
    pub date: NaiveDate,
    pub present: usize,
    pub absent: usize,
    /// Rounded share of the roster marked present, 0–100.
    pub percentage: u32,
    /// Ids marked present, in first-seen order.
    pub present_ids: Vec<String>,
}

impl SessionSummary {
    pub fn new(
        session_id: Uuid,
        course: CourseContext,
        date: NaiveDate,
        ledger: &AttendanceLedger,
        roster_size: usize,
    ) -> Self {
        let present = ledger.len();
        let total = roster_size.max(present);
        Self {
            session_id,
            course,
            date,
            present,
            absent: total - present,
            percentage: rounded_percent(present, total),
            present_ids: ledger
                .records()
                .iter()
                .map(|r| r.identity.id.clone())
                .collect(),
        }
    }
}

/// Attendance of one roster student across a course's sessions.
#[derive(Debug, Clone, Serialize)]
pub struct StudentAttendance {
    pub id: String,
    pub name: String,
    pub attended: usize,
    pub percentage: u32,
}

/// Dashboard view of a single course.
#[derive(Debug, Clone, Serialize)]
pub struct CourseReport {
    pub course: String,
    pub title: Option<String>,
    pub total_sessions: usize,
    pub average_percentage: u32,
    pub sessions: Vec<SessionSummary>,
    pub students: Vec<StudentAttendance>,
}

/// In-memory archive of closed sessions, in close order.
#[derive(Debug, Default)]
pub struct AttendanceHistory {
    sessions: Vec<SessionSummary>,
}

impl AttendanceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archive(&mut self, summary: SessionSummary) {
        tracing::info!(
            session = %summary.session_id,
            course = %summary.course,
            present = summary.present,
            percentage = summary.percentage,
            "session archived"
        );
        self.sessions.push(summary);
    }

    pub fn sessions_for<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a SessionSummary> {
        self.sessions.iter().filter(move |s| s.course.code == code)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Build the dashboard for `code` against the current roster.
    pub fn report(&self, code: &str, title: Option<String>, roster: &Roster) -> CourseReport {
        let sessions: Vec<SessionSummary> = self.sessions_for(code).cloned().collect();
        let total = sessions.len();

        let average_percentage = if total == 0 {
            0
        } else {
            let sum: u32 = sessions.iter().map(|s| s.percentage).sum();
            (sum as f64 / total as f64).round() as u32
        };

        let students = roster
            .students()
            .iter()
            .map(|student| {
                let attended = sessions
                    .iter()
                    .filter(|s| s.present_ids.iter().any(|id| *id == student.id))
                    .count();
                StudentAttendance {
                    id: student.id.clone(),
                    name: student.name.clone(),
                    attended,
                    percentage: rounded_percent(attended, total),
                }
            })
            .collect();

        CourseReport {
            course: code.to_string(),
            title,
            total_sessions: total,
            average_percentage,
            sessions,
            students,
        }
    }
}

fn rounded_percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 * 100.0 / whole as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identity;
    use chrono::Utc;

    fn ctx(code: &str) -> CourseContext {
        CourseContext {
            code: code.into(),
            section_id: "A1".into(),
        }
    }

    fn ledger_with(ids: &[&str]) -> AttendanceLedger {
        let mut ledger = AttendanceLedger::new();
        for id in ids {
            ledger.record(Identity::new(*id, *id), Utc::now());
        }
        ledger
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    #[test]
    fn test_rounded_percent() {
        assert_eq!(rounded_percent(0, 0), 0);
        assert_eq!(rounded_percent(25, 27), 93);
        assert_eq!(rounded_percent(22, 27), 81);
        assert_eq!(rounded_percent(2, 3), 67);
        assert_eq!(rounded_percent(3, 3), 100);
    }

    #[test]
    fn test_summary_counts() {
        let s = SessionSummary::new(Uuid::new_v4(), ctx("CS101"), date(19), &ledger_with(&["ST001"]), 4);
        assert_eq!(s.present, 1);
        assert_eq!(s.absent, 3);
        assert_eq!(s.percentage, 25);
        assert_eq!(s.present_ids, vec!["ST001"]);
    }

    #[test]
    fn test_summary_empty_roster() {
        let s = SessionSummary::new(Uuid::new_v4(), ctx("CS101"), date(19), &AttendanceLedger::new(), 0);
        assert_eq!(s.present, 0);
        assert_eq!(s.absent, 0);
        assert_eq!(s.percentage, 0);
    }

    #[test]
    fn test_report_no_sessions() {
        let roster = Roster::embedded().unwrap();
        let report = AttendanceHistory::new().report("CS101", None, &roster);
        assert_eq!(report.total_sessions, 0);
        assert_eq!(report.average_percentage, 0);
        assert_eq!(report.students.len(), 4);
        assert!(report.students.iter().all(|s| s.attended == 0 && s.percentage == 0));
    }

    #[test]
    fn test_report_aggregates_course_sessions() {
        let roster = Roster::embedded().unwrap();
        let mut history = AttendanceHistory::new();
        history.archive(SessionSummary::new(
            Uuid::new_v4(),
            ctx("CS201"),
            date(14),
            &ledger_with(&["ST001", "ST002", "ST003", "ST004"]),
            4,
        ));
        history.archive(SessionSummary::new(
            Uuid::new_v4(),
            ctx("CS201"),
            date(16),
            &ledger_with(&["ST001", "ST003"]),
            4,
        ));
        history.archive(SessionSummary::new(
            Uuid::new_v4(),
            ctx("CS201"),
            date(19),
            &ledger_with(&["ST001"]),
            4,
        ));
        // another course must not leak into the report
        history.archive(SessionSummary::new(
            Uuid::new_v4(),
            ctx("CS101"),
            date(19),
            &ledger_with(&["ST002"]),
            4,
        ));

        let report = history.report("CS201", Some("Data Structures".into()), &roster);
        assert_eq!(report.total_sessions, 3);
        // (100 + 50 + 25) / 3 = 58.33
        assert_eq!(report.average_percentage, 58);

        let by_id = |id: &str| report.students.iter().find(|s| s.id == id).unwrap();
        assert_eq!(by_id("ST001").attended, 3);
        assert_eq!(by_id("ST001").percentage, 100);
        assert_eq!(by_id("ST003").attended, 2);
        assert_eq!(by_id("ST003").percentage, 67);
        assert_eq!(by_id("ST002").attended, 1);
        assert_eq!(by_id("ST002").percentage, 33);
        assert_eq!(history.len(), 4);
    }
}
