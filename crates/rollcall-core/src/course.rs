//! Course catalog and the course context required before capture can start.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no course selected")]
    MissingCourse,
    #[error("no course section id given")]
    MissingSection,
    #[error("unknown course: {0}")]
    UnknownCourse(String),
}

/// A course offered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub code: String,
    pub title: String,
}

const DEFAULT_CATALOG: [(&str, &str); 4] = [
    ("CS101", "Introduction to Computer Science"),
    ("CS201", "Data Structures"),
    ("CS301", "Database Systems"),
    ("CS401", "Machine Learning"),
];

/// The set of courses attendance can be taken for.
#[derive(Debug, Clone)]
pub struct Catalog {
    courses: Vec<Course>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            courses: DEFAULT_CATALOG
                .iter()
                .map(|(code, title)| Course {
                    code: code.to_string(),
                    title: title.to_string(),
                })
                .collect(),
        }
    }
}

impl Catalog {
    pub fn get(&self, code: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.code == code)
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    /// Validate a raw course selection into a [`CourseContext`].
    ///
    /// Both fields are trimmed; an empty course is reported before an empty
    /// section.
    pub fn select(&self, code: &str, section_id: &str) -> Result<CourseContext, ValidationError> {
        let code = code.trim();
        let section_id = section_id.trim();

        if code.is_empty() {
            return Err(ValidationError::MissingCourse);
        }
        if section_id.is_empty() {
            return Err(ValidationError::MissingSection);
        }
        let course = self
            .get(code)
            .ok_or_else(|| ValidationError::UnknownCourse(code.to_string()))?;

        Ok(CourseContext {
            code: course.code.clone(),
            section_id: section_id.to_string(),
        })
    }
}

/// A validated course selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseContext {
    pub code: String,
    pub section_id: String,
}

impl std::fmt::Display for CourseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.code, self.section_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_valid() {
        let ctx = Catalog::default().select(" CS201 ", "A1 ").unwrap();
        assert_eq!(ctx.code, "CS201");
        assert_eq!(ctx.section_id, "A1");
        assert_eq!(ctx.to_string(), "CS201/A1");
    }

    #[test]
    fn test_select_missing_course() {
        let err = Catalog::default().select("", "A1").unwrap_err();
        assert_eq!(err, ValidationError::MissingCourse);
    }

    #[test]
    fn test_select_missing_both_reports_course_first() {
        let err = Catalog::default().select("  ", "").unwrap_err();
        assert_eq!(err, ValidationError::MissingCourse);
    }

    #[test]
    fn test_select_missing_section() {
        let err = Catalog::default().select("CS101", "   ").unwrap_err();
        assert_eq!(err, ValidationError::MissingSection);
    }

    #[test]
    fn test_select_unknown_course() {
        let err = Catalog::default().select("MATH9", "A1").unwrap_err();
        assert_eq!(err, ValidationError::UnknownCourse("MATH9".into()));
    }

    #[test]
    fn test_default_catalog() {
        let catalog = Catalog::default();
        assert_eq!(catalog.courses().len(), 4);
        assert_eq!(catalog.get("CS401").unwrap().title, "Machine Learning");
    }
}
