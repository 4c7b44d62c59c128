use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A roster entry: one registrable student.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One accepted attendance entry for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub identity: Identity,
    pub timestamp: DateTime<Utc>,
}

/// Result of offering a proposal to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    DuplicateRejected,
}

impl Outcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, Outcome::Accepted)
    }
}

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

// Landmark positions as fractions of the box.
const LANDMARK_FRACTIONS: [(f32, f32); 5] = [
    (0.3, 0.3),
    (0.7, 0.3),
    (0.5, 0.5),
    (0.35, 0.7),
    (0.65, 0.7),
];

impl BoundingBox {
    /// Fixed overlay drawn for a simulated detection on a `width` x `height` frame.
    ///
    /// The box covers the central half of the frame horizontally and 60% of it
    /// vertically, starting 20% from the top.
    pub fn simulated(width: u32, height: u32) -> Self {
        let x = width as f32 * 0.25;
        let y = height as f32 * 0.2;
        let w = width as f32 * 0.5;
        let h = height as f32 * 0.6;

        let landmarks = LANDMARK_FRACTIONS.map(|(fx, fy)| (x + w * fx, y + h * fy));

        Self {
            x,
            y,
            width: w,
            height: h,
            confidence: 1.0,
            landmarks: Some(landmarks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_box_geometry() {
        let b = BoundingBox::simulated(640, 360);
        assert!((b.x - 160.0).abs() < 1e-4);
        assert!((b.y - 72.0).abs() < 1e-4);
        assert!((b.width - 320.0).abs() < 1e-4);
        assert!((b.height - 216.0).abs() < 1e-4);
    }

    #[test]
    fn test_simulated_landmarks_inside_box() {
        let b = BoundingBox::simulated(640, 480);
        let landmarks = b.landmarks.unwrap();
        for (lx, ly) in landmarks {
            assert!(lx > b.x && lx < b.x + b.width);
            assert!(ly > b.y && ly < b.y + b.height);
        }
        // nose sits at the centre of the box
        let (nx, ny) = landmarks[2];
        assert!((nx - (b.x + b.width / 2.0)).abs() < 1e-4);
        assert!((ny - (b.y + b.height / 2.0)).abs() < 1e-4);
    }

    #[test]
    fn test_zero_sized_frame() {
        let b = BoundingBox::simulated(0, 0);
        assert_eq!(b.width, 0.0);
        assert_eq!(b.landmarks.unwrap()[0], (0.0, 0.0));
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let s = serde_json::to_string(&Outcome::DuplicateRejected).unwrap();
        assert_eq!(s, "\"duplicate_rejected\"");
    }
}
