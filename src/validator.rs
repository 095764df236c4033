//! Required-field validation of JSON request bodies.
//!
//! A [`Validator`] holds an ordered list of [`Rule`]s. Each rule names a
//! field that must be present among the top-level keys of the body, plus
//! the message reported when it is not. Rules are checked in insertion
//! order and the first missing field wins.
//!
//! ```rust
//! use serde_json::json;
//! use sprig::Validator;
//!
//! let mut v = Validator::new();
//! v.try_required("username").unwrap();
//! v.try_required("password").unwrap();
//!
//! assert!(!v.validate(Some(&json!({ "username": "a" }))));
//! assert_eq!(v.error(), Some("The field 'password' is required."));
//! ```
//!
//! A failed validation keeps the rules (the error message borrows from them)
//! until [`Validator::release`] or drop. A successful one releases them
//! immediately.

use std::process;

use serde_json::Value;
use tracing::error;

use crate::error::{Error, ErrorKind};

/// Reported when `validate` gets no body.
pub const MISSING_BODY_MESSAGE: &str = "Request body is missing or malformed.";

const INITIAL_CAPACITY: usize = 4;

/// One required-field rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    field: String,
    message: String,
}

impl Rule {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Failure {
    MissingBody,
    Rule(usize),
}

#[derive(Debug)]
pub struct Validator {
    rules: Vec<Rule>,
    failure: Option<Failure>,
}

impl Validator {
    /// Creates an empty validator with room for four rules.
    ///
    /// If that reservation fails the validator starts with no capacity and
    /// grows on the first [`try_add_rule`](Validator::try_add_rule).
    pub fn new() -> Self {
        let mut rules = Vec::new();
        if rules.try_reserve_exact(INITIAL_CAPACITY).is_err() {
            rules = Vec::new();
        }
        Self { rules, failure: None }
    }

    /// Appends a rule requiring `field`, reported with `message`.
    ///
    /// Empty arguments fail with [`ErrorKind::NullArgument`], allocation
    /// failure with [`ErrorKind::OutOfMemory`]. On error no rule is added.
    pub fn try_add_rule(&mut self, field: &str, message: &str) -> Result<(), Error> {
        if field.is_empty() || message.is_empty() {
            return Err(ErrorKind::NullArgument.into());
        }

        if self.rules.len() == self.rules.capacity() {
            let grown = match self.rules.capacity() {
                0 => INITIAL_CAPACITY,
                n => n.checked_mul(2).ok_or(ErrorKind::OutOfMemory)?,
            };
            self.rules.try_reserve_exact(grown - self.rules.len())?;
        }

        let field = try_copy(field)?;
        let message = try_copy(message)?;
        self.rules.push(Rule { field, message });
        Ok(())
    }

    /// Adds a rule with the standard message `The field '<field>' is required.`
    pub fn try_required(&mut self, field: &str) -> Result<(), Error> {
        let message = format!("The field '{field}' is required.");
        self.try_add_rule(field, &message)
    }

    /// Like [`try_add_rule`](Validator::try_add_rule) but terminates the
    /// process on failure.
    #[deprecated(note = "use `try_add_rule`, which reports failure instead of exiting")]
    pub fn add_rule(&mut self, field: &str, message: &str) {
        if let Err(e) = self.try_add_rule(field, message) {
            fatal(&e);
        }
    }

    /// Like [`try_required`](Validator::try_required) but terminates the
    /// process on failure.
    #[deprecated(note = "use `try_required`, which reports failure instead of exiting")]
    pub fn required(&mut self, field: &str) {
        if let Err(e) = self.try_required(field) {
            fatal(&e);
        }
    }

    /// Checks `body` against every rule, in order.
    ///
    /// Returns `true` when every field is present, releasing the rules.
    /// Returns `false` otherwise and leaves the reason in
    /// [`error`](Validator::error); the rules stay until released.
    pub fn validate(&mut self, body: Option<&Value>) -> bool {
        let Some(body) = body else {
            self.failure = Some(Failure::MissingBody);
            return false;
        };

        if let Some(index) = self.rules.iter().position(|rule| !has_field(body, &rule.field)) {
            self.failure = Some(Failure::Rule(index));
            return false;
        }

        self.release();
        true
    }

    /// The message of the last failed validation, if any.
    pub fn error(&self) -> Option<&str> {
        match self.failure? {
            Failure::MissingBody => Some(MISSING_BODY_MESSAGE),
            Failure::Rule(index) => self.rules.get(index).map(Rule::message),
        }
    }

    /// Drops every rule and its storage, and clears the error. Safe to call
    /// any number of times.
    pub fn release(&mut self) {
        self.rules = Vec::new();
        self.failure = None;
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn capacity(&self) -> usize {
        self.rules.capacity()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `field` is a top-level key of `body`. Non-objects have no keys.
pub fn has_field(body: &Value, field: &str) -> bool {
    body.as_object().is_some_and(|map| map.contains_key(field))
}

fn try_copy(s: &str) -> Result<String, Error> {
    let mut owned = String::new();
    owned.try_reserve_exact(s.len())?;
    owned.push_str(s);
    Ok(owned)
}

fn fatal(e: &Error) -> ! {
    error!(error = %e, "fatal validator error");
    process::exit(1)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn starts_empty_with_room() {
        let v = Validator::new();
        assert_eq!(v.rule_count(), 0);
        assert!(v.capacity() >= INITIAL_CAPACITY);
        assert_eq!(v.error(), None);
    }

    #[test]
    fn adds_rules_in_order() {
        let mut v = Validator::new();
        v.try_add_rule("username", "Username is required").unwrap();
        v.try_add_rule("email", "Email is required").unwrap();

        assert_eq!(v.rule_count(), 2);
        assert_eq!(v.rules()[0].field(), "username");
        assert_eq!(v.rules()[1].message(), "Email is required");
    }

    #[test]
    fn empty_arguments_are_rejected() {
        let mut v = Validator::new();
        assert_eq!(v.try_add_rule("", "message").unwrap_err().kind(), ErrorKind::NullArgument);
        assert_eq!(v.try_add_rule("field", "").unwrap_err().kind(), ErrorKind::NullArgument);
        assert_eq!(v.try_required("").unwrap_err().kind(), ErrorKind::NullArgument);
        assert_eq!(v.rule_count(), 0);
    }

    #[test]
    fn required_generates_the_message() {
        let mut v = Validator::new();
        v.try_required("name").unwrap();
        assert_eq!(v.rules()[0].message(), "The field 'name' is required.");
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut v = Validator::new();
        for i in 0..20 {
            v.try_add_rule(&format!("field{i}"), "message").unwrap();
        }
        assert_eq!(v.rule_count(), 20);
        assert!(v.capacity() >= 20);
    }

    #[test]
    fn missing_body_keeps_rules() {
        let mut v = Validator::new();
        v.try_required("name").unwrap();

        assert!(!v.validate(None));
        assert_eq!(v.error(), Some(MISSING_BODY_MESSAGE));
        assert_eq!(v.rule_count(), 1);
    }

    #[test]
    fn first_missing_field_wins() {
        let mut v = Validator::new();
        v.try_required("username").unwrap();
        v.try_required("password").unwrap();

        assert!(!v.validate(Some(&json!({ "username": "a" }))));
        assert_eq!(v.error(), Some("The field 'password' is required."));
        assert_eq!(v.rule_count(), 2);

        v.release();
        v.release();
        assert_eq!(v.rule_count(), 0);
        assert_eq!(v.capacity(), 0);
        assert_eq!(v.error(), None);
    }

    #[test]
    fn success_releases_rules() {
        let mut v = Validator::new();
        v.try_required("username").unwrap();
        v.try_required("password").unwrap();

        assert!(v.validate(Some(&json!({ "username": "a", "password": "b" }))));
        assert_eq!(v.rule_count(), 0);
        assert_eq!(v.error(), None);

        v.release();
        assert_eq!(v.rule_count(), 0);
    }

    #[test]
    fn only_top_level_keys_count() {
        let mut v = Validator::new();
        v.try_required("name").unwrap();
        assert!(!v.validate(Some(&json!({ "user": { "name": "x" } }))));
        assert!(!v.validate(Some(&json!(["name"]))));
        assert!(!v.validate(Some(&json!("name"))));

        // Null values still count as present.
        assert!(v.validate(Some(&json!({ "name": null }))));
    }

    #[test]
    fn no_rules_accepts_any_body() {
        let mut v = Validator::new();
        assert!(v.validate(Some(&json!(42))));
    }

    #[test]
    #[allow(deprecated)]
    fn legacy_variants_add_rules() {
        let mut v = Validator::new();
        v.add_rule("field", "message");
        v.required("other");
        assert_eq!(v.rule_count(), 2);
    }
}
