//! Client-side checks on the authoring brief.
//!
//! These run before a create request is built. A failure is a
//! [`SessionError::Validation`] and never reaches the backend.

use crate::error::{Result, SessionError};
use crate::types::DocumentMetadata;

pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 500;
pub const TONE_MAX: usize = 20;
pub const KEYWORDS_MAX: usize = 200;
pub const AUDIENCE_MAX: usize = 100;

/// Check a required free-text field.
pub fn text_field(value: &str, field: &str, max_len: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SessionError::Validation(format!("{} is required.", field)));
    }
    if value.chars().count() > max_len {
        return Err(SessionError::Validation(format!(
            "{} must be under {} characters.",
            field, max_len
        )));
    }
    Ok(())
}

/// Both bounds must be non-zero and `max` strictly greater than `min`.
pub fn min_max(min: u32, max: u32, field: &str) -> Result<()> {
    if min == 0 || max == 0 || max <= min {
        return Err(SessionError::Validation(format!(
            "{} max value must be greater than min value.",
            field
        )));
    }
    Ok(())
}

impl DocumentMetadata {
    /// Validate the brief; the first failing field wins.
    pub fn validate(&self) -> Result<()> {
        text_field(&self.title, "Title", TITLE_MAX)?;
        text_field(&self.description, "Description", DESCRIPTION_MAX)?;
        text_field(&self.desired_tone, "Tone", TONE_MAX)?;
        text_field(&self.keywords.join(", "), "SEO keywords", KEYWORDS_MAX)?;
        text_field(&self.target_audience, "Target audience", AUDIENCE_MAX)?;
        min_max(self.length_min, self.length_max, "Blog Length")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> DocumentMetadata {
        DocumentMetadata {
            title: "Cats".into(),
            description: "Why cats rule".into(),
            desired_tone: "playful".into(),
            target_audience: "pet owners".into(),
            length_min: 500,
            length_max: 900,
            keywords: vec!["cats".into(), "pets".into()],
        }
    }

    #[test]
    fn test_valid_brief() {
        assert!(brief().validate().is_ok());
    }

    #[test]
    fn test_missing_title() {
        let mut b = brief();
        b.title = "   ".into();
        assert_eq!(
            b.validate().unwrap_err(),
            SessionError::Validation("Title is required.".into())
        );
    }

    #[test]
    fn test_tone_too_long() {
        let mut b = brief();
        b.desired_tone = "x".repeat(21);
        assert_eq!(
            b.validate().unwrap_err().to_string(),
            "Tone must be under 20 characters."
        );
    }

    #[test]
    fn test_no_keywords() {
        let mut b = brief();
        b.keywords.clear();
        assert_eq!(
            b.validate().unwrap_err().to_string(),
            "SEO keywords is required."
        );
    }

    #[test]
    fn test_length_bounds() {
        let mut b = brief();
        b.length_max = 500;
        assert_eq!(
            b.validate().unwrap_err().to_string(),
            "Blog Length max value must be greater than min value."
        );
        b.length_min = 0;
        b.length_max = 100;
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_first_failure_wins() {
        let mut b = brief();
        b.title.clear();
        b.description.clear();
        assert_eq!(b.validate().unwrap_err().to_string(), "Title is required.");
    }
}
