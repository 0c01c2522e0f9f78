use std::sync::OnceLock;

use regex::Regex;

use crate::common::errors::{ApiError, FieldViolation};

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
        )
        .expect("Regex should compile")
    })
}

pub fn is_email(value: &str) -> bool {
    value.len() <= 254 && email_regex().is_match(value)
}

/// Non-empty and at least `min` characters long.
pub fn has_min_length(value: &str, min: usize) -> bool {
    !value.is_empty() && value.chars().count() >= min
}

/// Collects every failed rule for one operation before anything is written.
#[derive(Debug, Default)]
pub struct Violations {
    items: Vec<FieldViolation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn email(&mut self, field: &str, value: &str, message: &str) -> &mut Self {
        if !is_email(value) {
            self.push(field, message);
        }
        self
    }

    pub fn min_length(&mut self, field: &str, value: &str, min: usize, message: &str) -> &mut Self {
        if !has_min_length(value, min) {
            self.push(field, message);
        }
        self
    }

    fn push(&mut self, field: &str, message: &str) {
        self.items.push(FieldViolation {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Fails with one `BadInput` carrying all violations, in check order.
    pub fn finish(self, message: &str) -> Result<(), ApiError> {
        if self.items.is_empty() {
            return Ok(());
        }
        Err(ApiError::BadInput {
            message: message.to_string(),
            violations: self.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_email("ada@example.com"));
        assert!(is_email("first.last+tag@mail.example.org"));
        assert!(!is_email("ada@"));
        assert!(!is_email("ada.example.com"));
        assert!(!is_email("ada@example"));
        assert!(!is_email("a da@example.com"));
        assert!(!is_email(""));
    }

    #[test]
    fn min_length_counts_characters() {
        assert!(has_min_length("héllo", 5));
        assert!(!has_min_length("abcd", 5));
        assert!(!has_min_length("", 0));
    }

    #[test]
    fn accumulates_all_violations_in_order() {
        let mut v = Violations::new();
        v.min_length("title", "abc", 5, "title too short")
            .min_length("content", "ab", 5, "content too short");

        match v.finish("Bad Input!") {
            Err(ApiError::BadInput { message, violations }) => {
                assert_eq!(message, "Bad Input!");
                assert_eq!(violations.len(), 2);
                assert_eq!(violations[0].field, "title");
                assert_eq!(violations[1].field, "content");
            }
            other => panic!("expected BadInput, got {:?}", other),
        }
    }

    #[test]
    fn clean_input_passes() {
        let mut v = Violations::new();
        v.email("email", "ada@example.com", "Invalid email")
            .min_length("password", "longenough", 8, "too short");
        assert!(v.is_empty());
        assert!(v.finish("Bad Input").is_ok());
    }
}
