//! Pure, database-free row validation (component 1 of the overview).
//!
//! Takes pre-indexed duplicate/existing email sets from the caller; never
//! touches the database itself.

use std::collections::HashSet;
use std::sync::OnceLock;

use contact_ingest_protocol::{FieldRow, IssueType};
use regex::Regex;

const REQUIRED_FIELDS: [&str; 4] = ["email", "first_name", "last_name", "company"];

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
            .expect("email pattern is a valid, fixed regex")
    })
}

/// Result of validating one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid { issue_type: IssueType, message: String },
}

/// Lowercase and trim an email for set membership and hashing.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_blank(value: Option<&String>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Validate one row against the rules of §4.1, in order: missing required
/// field, invalid email shape, duplicate-in-batch, already-exists-for-user.
/// The first rule that fails wins; later rules are not evaluated.
pub fn validate(
    row: &FieldRow,
    duplicate_emails: &HashSet<String>,
    existing_emails: &HashSet<String>,
) -> ValidationOutcome {
    for field in REQUIRED_FIELDS {
        if is_blank(row.get(field)) {
            return ValidationOutcome::Invalid {
                issue_type: IssueType::MissingRequiredField,
                message: format!("required field '{field}' is missing or empty"),
            };
        }
    }

    let raw_email = row.get("email").expect("checked non-blank above");
    let normalized = normalize_email(raw_email);

    if !email_pattern().is_match(&normalized) {
        return ValidationOutcome::Invalid {
            issue_type: IssueType::InvalidEmail,
            message: format!("'{raw_email}' is not a valid email address"),
        };
    }

    if duplicate_emails.contains(&normalized) {
        return ValidationOutcome::Invalid {
            issue_type: IssueType::DuplicateEmail,
            message: format!("email '{normalized}' appears more than once in this batch"),
        };
    }

    if existing_emails.contains(&normalized) {
        return ValidationOutcome::Invalid {
            issue_type: IssueType::ExistingEmail,
            message: format!("email '{normalized}' already exists for this user"),
        };
    }

    ValidationOutcome::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(email: &str, first: &str, last: &str, company: &str) -> FieldRow {
        let mut r = FieldRow::new();
        r.insert("email".into(), email.into());
        r.insert("first_name".into(), first.into());
        r.insert("last_name".into(), last.into());
        r.insert("company".into(), company.into());
        r
    }

    #[test]
    fn accepts_a_clean_row() {
        let r = row("a@x.io", "Ann", "Lee", "Acme");
        let empty = HashSet::new();
        assert_eq!(validate(&r, &empty, &empty), ValidationOutcome::Valid);
    }

    #[test]
    fn flags_missing_required_field() {
        let r = row("", "Jo", "Day", "Co");
        let empty = HashSet::new();
        let outcome = validate(&r, &empty, &empty);
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid { issue_type: IssueType::MissingRequiredField, .. }
        ));
    }

    #[test]
    fn flags_whitespace_only_field_as_missing() {
        let r = row("a@x.io", "   ", "Day", "Co");
        let empty = HashSet::new();
        let outcome = validate(&r, &empty, &empty);
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid { issue_type: IssueType::MissingRequiredField, .. }
        ));
    }

    #[test]
    fn flags_invalid_email_shape() {
        let r = row("not-an-email", "Kim", "Lee", "Co");
        let empty = HashSet::new();
        let outcome = validate(&r, &empty, &empty);
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid { issue_type: IssueType::InvalidEmail, .. }
        ));
    }

    #[test]
    fn flags_csv_duplicate_before_existing() {
        let r = row("a@x.io", "Ann", "Lee", "Acme");
        let mut dup = HashSet::new();
        dup.insert("a@x.io".to_string());
        let mut existing = HashSet::new();
        existing.insert("a@x.io".to_string());

        let outcome = validate(&r, &dup, &existing);
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid { issue_type: IssueType::DuplicateEmail, .. }
        ));
    }

    #[test]
    fn flags_existing_email() {
        let r = row("a@x.io", "Ann", "Lee", "Acme");
        let dup = HashSet::new();
        let mut existing = HashSet::new();
        existing.insert("a@x.io".to_string());

        let outcome = validate(&r, &dup, &existing);
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid { issue_type: IssueType::ExistingEmail, .. }
        ));
    }

    #[test]
    fn normalizes_case_and_whitespace_for_set_membership() {
        let r = row("  A@X.IO  ", "Ann", "Lee", "Acme");
        let mut existing = HashSet::new();
        existing.insert("a@x.io".to_string());
        let dup = HashSet::new();

        let outcome = validate(&r, &dup, &existing);
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid { issue_type: IssueType::ExistingEmail, .. }
        ));
    }
}
