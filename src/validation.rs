// ABOUTME: Input validation for emails, passwords, names, phone numbers and free text
// ABOUTME: Collects per-field failures into a single validation error for 400 responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Validation
//!
//! Individual checks are plain functions. [`Validator`] runs several of them
//! against a request and reports every failing field at once.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use regex::Regex;

use crate::constants::limits::{
    MAX_NAME_LENGTH, MAX_SUPPORTED_YEAR, MIN_PASSWORD_LENGTH, MIN_SUPPORTED_YEAR,
};
use crate::errors::{AppError, AppResult, FieldError};

static EMAIL_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+'-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").ok()
});

const KEYBOARD_ROWS: [&str; 3] = ["qwertyuiop", "asdfghjkl", "zxcvbnm"];
const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?`~";

/// Check an email address
///
/// # Errors
///
/// Returns a message describing the problem.
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_owned());
    }
    if email.len() > 254 {
        return Err("Email is too long".to_owned());
    }
    let valid = EMAIL_PATTERN
        .as_ref()
        .map_or_else(|| email.contains('@'), |pattern| pattern.is_match(email));
    if valid {
        Ok(())
    } else {
        Err("Enter a valid email address".to_owned())
    }
}

/// Messages for every password rule `password` breaks
#[must_use]
pub fn password_failures(password: &str) -> Vec<String> {
    let mut failures = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        failures.push(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        failures.push("Password must contain an uppercase letter".to_owned());
    }
    if !password.chars().any(char::is_lowercase) {
        failures.push("Password must contain a lowercase letter".to_owned());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        failures.push("Password must contain a number".to_owned());
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        failures.push("Password must contain a special character".to_owned());
    }
    failures
}

const fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

fn contains_keyboard_run(word: &str) -> bool {
    if word.len() < 4 {
        return false;
    }
    KEYBOARD_ROWS.iter().any(|row| {
        let reversed: String = row.chars().rev().collect();
        word.as_bytes()
            .windows(4)
            .filter_map(|window| std::str::from_utf8(window).ok())
            .any(|window| row.contains(window) || reversed.contains(window))
    })
}

/// Whether a name looks like keyboard mashing
///
/// A name is gibberish when any word of four or more letters has no vowel
/// (`y` counts), any letter appears three times in a row, five consonants
/// appear in a row, or four adjacent keys of a keyboard row appear in order.
/// Only ASCII letters are judged; other scripts pass through.
#[must_use]
pub fn is_gibberish(name: &str) -> bool {
    let lowered = name.to_lowercase();

    let mut run_char = None;
    let mut run_len = 0;
    for c in lowered.chars() {
        if Some(c) == run_char {
            run_len += 1;
        } else {
            run_char = Some(c);
            run_len = 1;
        }
        if c.is_alphabetic() && run_len >= 3 {
            return true;
        }
    }

    lowered
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| !word.is_empty())
        .any(|word| {
            if word.len() >= 4 && !word.chars().any(is_vowel) {
                return true;
            }
            let mut consonants = 0;
            for c in word.chars() {
                consonants = if is_vowel(c) { 0 } else { consonants + 1 };
                if consonants >= 5 {
                    return true;
                }
            }
            contains_keyboard_run(word)
        })
}

/// Check and normalize a person's name
///
/// # Errors
///
/// Returns a message describing the problem.
pub fn validate_name(name: &str) -> Result<String, String> {
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err("Name is required".to_owned());
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("Name must be at most {MAX_NAME_LENGTH} characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_alphabetic() || matches!(c, ' ' | '-' | '\'' | '.'))
    {
        return Err("Name may only contain letters, spaces, hyphens, apostrophes and periods".to_owned());
    }
    if !name.chars().any(char::is_alphabetic) {
        return Err("Name must contain letters".to_owned());
    }
    if is_gibberish(&name) {
        return Err("Please enter a real name".to_owned());
    }
    Ok(name)
}

/// Normalize a phone number to `+digits` or `digits`
///
/// # Errors
///
/// Returns a message when the number has fewer than 7 or more than 15 digits
/// or contains characters other than digits and separators.
pub fn normalize_phone(phone: &str) -> Result<String, String> {
    let phone = phone.trim();
    let (plus, rest) = phone
        .strip_prefix('+')
        .map_or((false, phone), |rest| (true, rest));

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return Err("Phone number may only contain digits and separators".to_owned()),
        }
    }
    if !(7..=15).contains(&digits.len()) {
        return Err("Phone number must have between 7 and 15 digits".to_owned());
    }
    Ok(if plus { format!("+{digits}") } else { digits })
}

/// Trim, drop control characters (keeping newlines and tabs) and cap length
#[must_use]
pub fn sanitize_text(text: &str, max_chars: usize) -> String {
    text.trim()
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .take(max_chars)
        .collect()
}

/// Check that a client-supplied date lies in the supported calendar range
///
/// # Errors
///
/// Returns a message naming the supported years.
pub fn check_date(date: NaiveDate) -> Result<NaiveDate, String> {
    if (MIN_SUPPORTED_YEAR..=MAX_SUPPORTED_YEAR).contains(&date.year()) {
        Ok(date)
    } else {
        Err(format!(
            "Dates must fall between the years {MIN_SUPPORTED_YEAR} and {MAX_SUPPORTED_YEAR}"
        ))
    }
}

/// [`check_date`] for a single field, as an input error
///
/// # Errors
///
/// Returns `InvalidInput` naming `field`.
pub fn require_date(field: &str, date: NaiveDate) -> AppResult<NaiveDate> {
    check_date(date).map_err(|message| AppError::invalid_input(format!("{field}: {message}")))
}

/// [`require_date`] on the UTC calendar date of a timestamp
///
/// # Errors
///
/// Returns `InvalidInput` naming `field`.
pub fn require_instant(field: &str, at: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    require_date(field, at.date_naive()).map(|_| at)
}

/// Which end of a date window the default fills from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAnchor {
    /// `to` defaults to the date; `from` reaches back from `to`
    EndingAt(NaiveDate),
    /// `from` defaults to the date; `to` reaches forward from `from`
    StartingAt(NaiveDate),
}

/// Resolve an inclusive `from..=to` day window from optional query bounds
///
/// Missing bounds span `default_days`; the window may cover at most `max_days`.
///
/// # Errors
///
/// Returns `InvalidInput` for dates outside the supported range, `from`
/// after `to`, or a window longer than `max_days`.
pub fn day_window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    anchor: WindowAnchor,
    default_days: i64,
    max_days: i64,
) -> AppResult<(NaiveDate, NaiveDate)> {
    let span = Days::new(u64::try_from(default_days - 1).unwrap_or(0));
    let out_of_range = || AppError::invalid_input("The requested window is out of range");
    let (from, to) = match anchor {
        WindowAnchor::EndingAt(today) => {
            let to = require_date("to", to.unwrap_or(today))?;
            let from = match from {
                Some(from) => from,
                None => to.checked_sub_days(span).ok_or_else(out_of_range)?,
            };
            (require_date("from", from)?, to)
        }
        WindowAnchor::StartingAt(today) => {
            let from = require_date("from", from.unwrap_or(today))?;
            let to = match to {
                Some(to) => to,
                None => from.checked_add_days(span).ok_or_else(out_of_range)?,
            };
            (from, require_date("to", to)?)
        }
    };
    if from > to {
        return Err(AppError::invalid_input("from must not be after to"));
    }
    if to.signed_duration_since(from).num_days() >= max_days {
        return Err(AppError::invalid_input(format!(
            "The window may span at most {max_days} days"
        )));
    }
    Ok((from, to))
}

/// Accumulates field errors across several checks
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    /// Start with no errors
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Require a non-blank value
    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.add(field, format!("{field} is required"));
        }
        self
    }

    /// Check an email
    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if let Err(message) = validate_email(value) {
            self.add(field, message);
        }
        self
    }

    /// Check password strength, reporting every failing rule
    pub fn password(&mut self, field: &str, value: &str) -> &mut Self {
        for message in password_failures(value) {
            self.add(field, message);
        }
        self
    }

    /// Check a name; returns the normalized name when valid
    pub fn name(&mut self, field: &str, value: &str) -> Option<String> {
        match validate_name(value) {
            Ok(name) => Some(name),
            Err(message) => {
                self.add(field, message);
                None
            }
        }
    }

    /// Check an optional phone number; returns the normalized number
    pub fn phone(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        let value = value.map(str::trim).filter(|v| !v.is_empty())?;
        match normalize_phone(value) {
            Ok(phone) => Some(phone),
            Err(message) => {
                self.add(field, message);
                None
            }
        }
    }

    /// Require `value.chars().count() <= max`
    pub fn max_length(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.add(field, format!("{field} must be at most {max} characters"));
        }
        self
    }

    /// Check a date lies in the supported range
    pub fn date(&mut self, field: &str, value: NaiveDate) -> &mut Self {
        if let Err(message) = check_date(value) {
            self.add(field, message);
        }
        self
    }

    /// Whether any check failed
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Convert the collected failures into a result
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every failed field.
    pub fn finish(self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_names_pass() {
        for name in [
            "Mary Johnson",
            "Jean-Luc O'Neil",
            "Dr. Amy Wu",
            "Lynn",
            "José García",
            "Nguyen Van Anh",
        ] {
            assert!(validate_name(name).is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn gibberish_is_rejected() {
        assert!(is_gibberish("Bcdfg"));
        assert!(is_gibberish("Xkcd Brrr"));
        assert!(is_gibberish("Annna"));
        assert!(is_gibberish("Qwerty Smith"));
        assert!(is_gibberish("Mr Lkjh"));
        assert!(is_gibberish("Strengths"));
        assert!(!is_gibberish("Anna"));
    }

    #[test]
    fn name_charset_and_length() {
        assert!(validate_name("").is_err());
        assert!(validate_name("R2D2").is_err());
        assert!(validate_name(&"a".repeat(101)).is_err());
        assert_eq!(validate_name("  Ada   Lovelace ").unwrap(), "Ada Lovelace");
    }

    #[test]
    fn password_reports_each_failure() {
        assert!(password_failures("TestPass123!").is_empty());
        assert_eq!(password_failures("short").len(), 4);
        assert_eq!(password_failures("alllowercase1!").len(), 1);
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone("+1 (555) 010-2030").unwrap(), "+15550102030");
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("1234567890123456").is_err());
        assert!(normalize_phone("555-CALL-NOW").is_err());
    }

    #[test]
    fn sanitize_strips_control_characters() {
        assert_eq!(sanitize_text("  hi\u{0007}\nthere  ", 100), "hi\nthere");
        assert_eq!(sanitize_text("abcdef", 3), "abc");
    }

    #[test]
    fn day_window_defaults_and_limits() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let (from, to) = day_window(None, None, WindowAnchor::EndingAt(today), 7, 90).unwrap();
        assert_eq!((from, to), (NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(), today));

        let (from, to) = day_window(None, None, WindowAnchor::StartingAt(today), 14, 90).unwrap();
        assert_eq!((from, to), (today, NaiveDate::from_ymd_opt(2025, 3, 23).unwrap()));

        let later = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();
        let anchor = WindowAnchor::EndingAt(today);
        assert!(day_window(Some(later), Some(today), anchor, 7, 90).is_err());
        let far = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        assert!(day_window(Some(today), Some(far), anchor, 7, 90).is_err());
    }

    #[test]
    fn extreme_dates_are_rejected_not_computed() {
        let last = NaiveDate::MAX;
        let err = day_window(None, Some(last), WindowAnchor::EndingAt(last), 7, 90).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::InvalidInput);
        let first = NaiveDate::MIN;
        assert!(day_window(Some(first), None, WindowAnchor::StartingAt(first), 14, 90).is_err());
        assert!(require_instant("scheduledFor", DateTime::<Utc>::MIN_UTC).is_err());
        assert!(check_date(NaiveDate::from_ymd_opt(1941, 3, 9).unwrap()).is_ok());
    }

    #[test]
    fn validator_collects_fields() {
        let mut validator = Validator::new();
        validator.email("email", "not-an-email").password("password", "weak");
        let name = validator.name("name", "Zzzz");
        assert!(name.is_none());
        let err = validator.finish().unwrap_err();
        let fields: Vec<_> = err.field_errors.iter().map(|f| f.field.as_str()).collect();
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"password"));
        assert!(fields.contains(&"name"));
    }
}
