//! Student registration.
//!
//! Captured face samples are only counted; there is no model to train, so
//! the images themselves are dropped once the form validates.

use crate::roster::{Roster, RosterError};
use crate::types::Identity;
use thiserror::Error;

/// Number of samples the registration flow asks for.
pub const RECOMMENDED_SAMPLES: u32 = 5;

#[derive(Error, Debug)]
pub enum EnrollmentError {
    #[error("student name is required")]
    MissingName,
    #[error("student id is required")]
    MissingId,
    #[error("at least one face sample must be captured")]
    NoSamples,
    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// A filled-in registration form.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub name: String,
    pub id: String,
    pub samples: u32,
}

impl Enrollment {
    pub fn new(name: impl Into<String>, id: impl Into<String>, samples: u32) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            samples,
        }
    }

    /// Check the form and produce the roster identity it describes.
    pub fn validate(&self) -> Result<Identity, EnrollmentError> {
        let name = self.name.trim();
        let id = self.id.trim();
        if name.is_empty() {
            return Err(EnrollmentError::MissingName);
        }
        if id.is_empty() {
            return Err(EnrollmentError::MissingId);
        }
        if self.samples == 0 {
            return Err(EnrollmentError::NoSamples);
        }
        Ok(Identity::new(id, name))
    }

    /// Validate and append the student to `roster`.
    pub fn register(&self, roster: &mut Roster, recommended: u32) -> Result<Identity, EnrollmentError> {
        let identity = self.validate()?;
        if self.samples < recommended {
            tracing::warn!(
                id = %identity.id,
                samples = self.samples,
                recommended,
                "registering with fewer face samples than recommended"
            );
        }
        roster.insert(identity.clone())?;
        tracing::info!(id = %identity.id, name = %identity.name, "student registered");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_appends_to_roster() {
        let mut roster = Roster::embedded().unwrap();
        let identity = Enrollment::new(" Carol White ", "ST005", 5)
            .register(&mut roster, RECOMMENDED_SAMPLES)
            .unwrap();
        assert_eq!(identity, Identity::new("ST005", "Carol White"));
        assert_eq!(roster.len(), 5);
        assert_eq!(roster.students()[4].id, "ST005");
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            Enrollment::new("", "ST005", 1).validate(),
            Err(EnrollmentError::MissingName)
        ));
        assert!(matches!(
            Enrollment::new("Carol", "  ", 1).validate(),
            Err(EnrollmentError::MissingId)
        ));
        assert!(matches!(
            Enrollment::new("Carol", "ST005", 0).validate(),
            Err(EnrollmentError::NoSamples)
        ));
    }

    #[test]
    fn test_fewer_samples_than_recommended_still_registers() {
        let mut roster = Roster::default();
        assert!(Enrollment::new("Carol", "ST005", 1)
            .register(&mut roster, RECOMMENDED_SAMPLES)
            .is_ok());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut roster = Roster::embedded().unwrap();
        let err = Enrollment::new("Someone Else", "ST001", 5)
            .register(&mut roster, RECOMMENDED_SAMPLES)
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::Roster(RosterError::DuplicateId(_))));
        assert_eq!(roster.len(), 4);
    }
}
