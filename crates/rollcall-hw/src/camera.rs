//! Video sources: V4L2 devices via the `v4l` crate, and a simulated source
//! for machines without a camera.

use serde::Serialize;
use std::any::Any;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use v4l::prelude::*;
use v4l::video::Capture;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("video capture not supported")]
    CaptureNotSupported,
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Description of an acquired stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub device: String,
    pub width: u32,
    pub height: u32,
}

/// An acquired video stream. Dropping the handle releases the device.
pub struct StreamHandle {
    info: StreamInfo,
    _resource: Box<dyn Any + Send>,
}

impl StreamHandle {
    pub fn new(info: StreamInfo, resource: Box<dyn Any + Send>) -> Self {
        Self {
            info,
            _resource: resource,
        }
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").field("info", &self.info).finish()
    }
}

/// Something a capture controller can open a stream on.
pub trait VideoSource: Send {
    fn acquire(&mut self) -> Result<StreamHandle, CameraError>;
    fn name(&self) -> &str;
}

const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;

/// V4L2 camera by device path (e.g., "/dev/video0").
pub struct V4l2Source {
    device_path: String,
}

impl V4l2Source {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

impl VideoSource for V4l2Source {
    fn acquire(&mut self) -> Result<StreamHandle, CameraError> {
        let device_path = self.device_path.as_str();
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                CameraError::PermissionDenied(device_path.to_string())
            } else if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::DeviceNotFound(format!("failed to query capabilities: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::CaptureNotSupported);
        }

        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.width = REQUESTED_WIDTH;
        fmt.height = REQUESTED_HEIGHT;
        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "camera acquired"
        );

        let info = StreamInfo {
            device: device_path.to_string(),
            width: negotiated.width,
            height: negotiated.height,
        };
        Ok(StreamHandle::new(info, Box::new(device)))
    }

    fn name(&self) -> &str {
        &self.device_path
    }
}

/// Camera stand-in with no hardware behind it.
///
/// `open_streams` counts live handles, so callers can check that every
/// acquired stream was released.
pub struct SimulatedSource {
    width: u32,
    height: u32,
    deny: bool,
    open: Arc<AtomicUsize>,
}

struct SimulatedStream(Arc<AtomicUsize>);

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SimulatedSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            deny: false,
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source whose every acquisition is refused, as when camera
    /// permission is withheld.
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new(REQUESTED_WIDTH, REQUESTED_HEIGHT)
        }
    }

    /// Shared counter of currently open streams.
    pub fn open_streams(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.open)
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(REQUESTED_WIDTH, REQUESTED_HEIGHT)
    }
}

impl VideoSource for SimulatedSource {
    fn acquire(&mut self) -> Result<StreamHandle, CameraError> {
        if self.deny {
            return Err(CameraError::PermissionDenied("simulated camera".into()));
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        let info = StreamInfo {
            device: "sim".into(),
            width: self.width,
            height: self.height,
        };
        Ok(StreamHandle::new(
            info,
            Box::new(SimulatedStream(Arc::clone(&self.open))),
        ))
    }

    fn name(&self) -> &str {
        "sim"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_stream_released_on_drop() {
        let mut source = SimulatedSource::new(320, 240);
        let open = source.open_streams();

        let handle = source.acquire().unwrap();
        assert_eq!(open.load(Ordering::SeqCst), 1);
        assert_eq!(handle.info().width, 320);
        assert_eq!(handle.info().height, 240);

        drop(handle);
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_simulated_denied() {
        let mut source = SimulatedSource::denied();
        let open = source.open_streams();
        let err = source.acquire().unwrap_err();
        assert!(matches!(err, CameraError::PermissionDenied(_)));
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_v4l2_missing_device() {
        let mut source = V4l2Source::new("/dev/video-does-not-exist");
        let err = source.acquire().unwrap_err();
        assert_eq!(
            err,
            CameraError::DeviceNotFound("/dev/video-does-not-exist".into())
        );
    }
}
