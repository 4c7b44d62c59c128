//! rollcall-hw — Video source abstraction and capture lifecycle.
//!
//! Provides V4L2-based camera acquisition, a simulated source for
//! camera-less hosts, and the controller that owns the active stream.

pub mod camera;
pub mod controller;

pub use camera::{CameraError, DeviceInfo, SimulatedSource, StreamHandle, StreamInfo, V4l2Source, VideoSource};
pub use controller::{CaptureController, CaptureError};
