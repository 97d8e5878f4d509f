//! Environment validation.
//!
//! # Responsibilities
//! - Check that every required variable is present
//! - Validate value formats (ports, sizes, enumerations)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over a variable lookup, so tests never
//!   touch the process environment

use std::fmt;

/// Variables that have no default. Startup aborts when any is missing.
pub const REQUIRED_VARS: &[&str] = &[
    "POSTGRES_HOST",
    "POSTGRES_PORT",
    "POSTGRES_DB",
    "POSTGRES_USER",
    "POSTGRES_PASSWORD",
    "REDIS_HOST",
    "REDIS_PORT",
    "REDIS_PASSWORD",
    "BACKEND_PORT",
];

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required variable absent or empty.
    Missing(&'static str),
    /// Variable present but unusable.
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl ValidationError {
    pub fn is_missing(&self) -> bool {
        matches!(self, ValidationError::Missing(_))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Missing(var) => write!(f, "{} is not set", var),
            ValidationError::Invalid { var, value, reason } => {
                write!(f, "{}={:?} is invalid: {}", var, value, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Names of required variables that are absent or empty.
pub fn missing_vars<F>(lookup: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    REQUIRED_VARS
        .iter()
        .copied()
        .filter(|name| lookup(name).map_or(true, |v| v.trim().is_empty()))
        .collect()
}

/// Check that every required variable is present.
pub fn validate_required<F>(lookup: F) -> Result<(), Vec<ValidationError>>
where
    F: Fn(&str) -> Option<String>,
{
    let missing = missing_vars(lookup);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing.into_iter().map(ValidationError::Missing).collect())
    }
}

/// Render the startup diagnostic for a set of validation errors.
pub fn render_diagnostic(errors: &[ValidationError]) -> String {
    let mut out = String::new();

    let missing: Vec<_> = errors.iter().filter(|e| e.is_missing()).collect();
    if !missing.is_empty() {
        out.push_str("Missing required environment variables:\n");
        for err in &missing {
            if let ValidationError::Missing(var) = err {
                out.push_str(&format!("   - {}\n", var));
            }
        }
    }

    let invalid: Vec<_> = errors.iter().filter(|e| !e.is_missing()).collect();
    if !invalid.is_empty() {
        out.push_str("Invalid environment variables:\n");
        for err in &invalid {
            out.push_str(&format!("   - {}\n", err));
        }
    }

    out.push_str("\nPlease check your .env file.");
    out
}
