use crate::engine::{EngineError, EngineHandle};
use rollcall_core::enrollment::Enrollment;
use rollcall_hw::CaptureError;
use serde::Serialize;
use zbus::interface;

pub const BUS_NAME: &str = "org.rollcall.Attendance1";
pub const OBJECT_PATH: &str = "/org/rollcall/Attendance1";

/// D-Bus interface for the Rollcall attendance daemon.
///
/// Bus name: org.rollcall.Attendance1
/// Object path: /org/rollcall/Attendance1
///
/// Structured replies are JSON strings.
pub struct AttendanceService {
    engine: EngineHandle,
}

impl AttendanceService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

fn to_fdo(err: EngineError) -> zbus::fdo::Error {
    match err {
        EngineError::Capture(CaptureError::Validation(e)) => {
            zbus::fdo::Error::InvalidArgs(e.to_string())
        }
        e @ (EngineError::Enrollment(_) | EngineError::UnknownCourse(_)) => {
            zbus::fdo::Error::InvalidArgs(e.to_string())
        }
        e => zbus::fdo::Error::Failed(e.to_string()),
    }
}

fn to_json<T: Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(format!("encode reply: {e}")))
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Select a course and start capture. Returns the course and stream as JSON.
    async fn start_capture(&self, course: &str, section_id: &str) -> zbus::fdo::Result<String> {
        tracing::info!(course, section_id, "start_capture requested");
        let started = self.engine.start(course, section_id).await.map_err(to_fdo)?;
        to_json(&started)
    }

    /// Stop capture. Returns false if capture was not active.
    async fn stop_capture(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("stop_capture requested");
        self.engine.stop().await.map_err(to_fdo)
    }

    /// Run one detection now and return its outcome as JSON.
    async fn detect(&self) -> zbus::fdo::Result<String> {
        tracing::info!("detect requested");
        let detection = self.engine.detect().await.map_err(to_fdo)?;
        to_json(&detection)
    }

    /// Clear the attendance list.
    async fn reset(&self) -> zbus::fdo::Result<()> {
        tracing::info!("reset requested");
        self.engine.reset().await.map_err(to_fdo)
    }

    /// Stop, archive and renew the session. Returns the summary JSON or `null`.
    async fn close_session(&self) -> zbus::fdo::Result<String> {
        tracing::info!("close_session requested");
        let summary = self.engine.close().await.map_err(to_fdo)?;
        to_json(&summary)
    }

    /// Students marked present, in first-seen order.
    async fn list_present(&self) -> zbus::fdo::Result<String> {
        let present = self.engine.present().await.map_err(to_fdo)?;
        to_json(&present)
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.engine.status().await.map_err(to_fdo)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "session": status,
        })
        .to_string())
    }

    /// List the roster.
    async fn roster(&self) -> zbus::fdo::Result<String> {
        let students = self.engine.roster().await.map_err(to_fdo)?;
        to_json(&students)
    }

    /// Register a new student with the number of face samples captured.
    async fn register(&self, name: &str, id: &str, samples: u32) -> zbus::fdo::Result<String> {
        tracing::info!(id, samples, "register requested");
        let identity = self
            .engine
            .register(Enrollment::new(name, id, samples))
            .await
            .map_err(to_fdo)?;
        to_json(&identity)
    }

    /// Attendance dashboard for a course.
    async fn report(&self, course: &str) -> zbus::fdo::Result<String> {
        let report = self.engine.report(course).await.map_err(to_fdo)?;
        to_json(&report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::ValidationError;
    use rollcall_hw::CameraError;

    #[test]
    fn test_validation_maps_to_invalid_args() {
        let err = to_fdo(EngineError::Capture(CaptureError::Validation(
            ValidationError::MissingCourse,
        )));
        assert!(matches!(err, zbus::fdo::Error::InvalidArgs(msg) if msg == "no course selected"));
    }

    #[test]
    fn test_camera_maps_to_failed() {
        let err = to_fdo(EngineError::Capture(CaptureError::Camera(CameraError::DeviceBusy)));
        assert!(matches!(err, zbus::fdo::Error::Failed(msg) if msg.contains("device busy")));
    }

    #[test]
    fn test_unknown_course_maps_to_invalid_args() {
        let err = to_fdo(EngineError::UnknownCourse("XX1".into()));
        assert!(matches!(err, zbus::fdo::Error::InvalidArgs(_)));
    }
}
