//! Capture lifecycle: validate the course selection, acquire a stream,
//! release it on stop or drop.

use crate::camera::{CameraError, StreamHandle, StreamInfo, VideoSource};
use rollcall_core::{Catalog, CourseContext, ValidationError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("capture already active for {0}")]
    AlreadyActive(CourseContext),
}

/// Sole owner of the active video stream.
pub struct CaptureController {
    source: Box<dyn VideoSource>,
    catalog: Catalog,
    active: Option<(CourseContext, StreamHandle)>,
}

impl CaptureController {
    pub fn new(source: Box<dyn VideoSource>, catalog: Catalog) -> Self {
        Self {
            source,
            catalog,
            active: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Validate the course selection and acquire the video source.
    ///
    /// Nothing is acquired if validation fails or a stream is already open.
    pub fn start(
        &mut self,
        course: &str,
        section_id: &str,
    ) -> Result<(CourseContext, StreamInfo), CaptureError> {
        let ctx = self.catalog.select(course, section_id)?;
        if let Some((current, _)) = &self.active {
            return Err(CaptureError::AlreadyActive(current.clone()));
        }

        let handle = self.source.acquire().map_err(|e| {
            tracing::warn!(source = self.source.name(), error = %e, "camera acquisition failed");
            e
        })?;
        let info = handle.info().clone();
        tracing::info!(course = %ctx, device = %info.device, "capture started");

        self.active = Some((ctx.clone(), handle));
        Ok((ctx, info))
    }

    /// Release the stream if one is open. Returns whether anything was released.
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some((ctx, handle)) => {
                tracing::info!(course = %ctx, device = %handle.info().device, "capture stopped");
                drop(handle);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.active.as_ref().map(|(_, h)| h.info())
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.stop();
    }
}
