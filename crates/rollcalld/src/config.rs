use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0). `sim` selects the simulated
    /// camera, `sim-denied` a simulated camera that refuses access.
    pub camera_device: String,
    /// Roster TOML file; the embedded roster is used when unset.
    pub roster_path: Option<PathBuf>,
    /// Period of automatic detection while capturing.
    pub detect_interval: Duration,
    /// Simulated recognition time between a trigger and its ledger update.
    pub processing_delay: Duration,
    /// Face samples asked for during registration.
    pub recommended_samples: u32,
    /// Capacity of the session event broadcast channel.
    pub event_buffer: usize,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            camera_device: std::env::var("ROLLCALL_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            roster_path: std::env::var("ROLLCALL_ROSTER_PATH").ok().map(PathBuf::from),
            detect_interval: Duration::from_millis(env_u64("ROLLCALL_DETECT_INTERVAL_MS", 5000)),
            processing_delay: Duration::from_millis(env_u64("ROLLCALL_PROCESSING_DELAY_MS", 2000)),
            recommended_samples: env_u32(
                "ROLLCALL_RECOMMENDED_SAMPLES",
                rollcall_core::enrollment::RECOMMENDED_SAMPLES,
            ),
            event_buffer: env_usize("ROLLCALL_EVENT_BUFFER", 64).max(1),
        }
    }

    pub fn engine(&self) -> crate::engine::EngineConfig {
        crate::engine::EngineConfig {
            detect_interval: self.detect_interval,
            processing_delay: self.processing_delay,
            recommended_samples: self.recommended_samples,
            event_buffer: self.event_buffer,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
