use crate::model::{FilmForm, UserForm};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt::Display;

pub const MAX_DESCRIPTION_LENGTH: usize = 200;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

/// Date of the first public film screening.
pub fn earliest_release_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1895, 12, 28).expect("valid calendar date")
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
    /// `None` when the field was absent.
    pub rejected_value: Option<String>,
}

impl Violation {
    fn new<V: Display>(field: &'static str, message: &str, value: Option<V>) -> Self {
        Violation {
            field,
            message: message.to_owned(),
            rejected_value: value.map(|v| v.to_string()),
        }
    }

    fn missing(field: &'static str) -> Self {
        Violation::new::<String>(field, "must not be null", None)
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

pub fn validate_user(user: &UserForm, today: NaiveDate) -> Vec<Violation> {
    let mut violations = Vec::new();

    match &user.email {
        None => violations.push(Violation::missing("email")),
        Some(email) if !EMAIL.is_match(email) => violations.push(Violation::new(
            "email",
            "must be a well-formed email address",
            Some(email),
        )),
        _ => {}
    }

    match &user.login {
        None => violations.push(Violation::missing("login")),
        Some(login) if is_blank(login) => {
            violations.push(Violation::new("login", "must not be blank", Some(login)))
        }
        Some(login) if login.chars().any(char::is_whitespace) => violations.push(Violation::new(
            "login",
            "must not contain whitespace",
            Some(login),
        )),
        _ => {}
    }

    match user.birthday {
        None => violations.push(Violation::missing("birthday")),
        Some(birthday) if birthday > today => violations.push(Violation::new(
            "birthday",
            "must be a date in the past or in the present",
            Some(birthday),
        )),
        _ => {}
    }

    violations
}

pub fn validate_film(film: &FilmForm) -> Vec<Violation> {
    let mut violations = Vec::new();

    match &film.name {
        None => violations.push(Violation::missing("name")),
        Some(name) if is_blank(name) => {
            violations.push(Violation::new("name", "must not be blank", Some(name)))
        }
        _ => {}
    }

    match &film.description {
        None => violations.push(Violation::missing("description")),
        Some(description) if description.chars().count() > MAX_DESCRIPTION_LENGTH => {
            violations.push(Violation::new(
                "description",
                &format!("size must be between 0 and {}", MAX_DESCRIPTION_LENGTH),
                Some(description),
            ))
        }
        _ => {}
    }

    match film.release_date {
        None => violations.push(Violation::missing("releaseDate")),
        Some(date) if date < earliest_release_date() => violations.push(Violation::new(
            "releaseDate",
            "must not be earlier than 1895-12-28",
            Some(date),
        )),
        _ => {}
    }

    match film.duration {
        None => violations.push(Violation::missing("duration")),
        Some(duration) if duration <= 0 => violations.push(Violation::new(
            "duration",
            "must be greater than 0",
            Some(duration),
        )),
        Some(duration) if duration > i64::from(u32::MAX) => violations.push(Violation::new(
            "duration",
            &format!("must be less than or equal to {}", u32::MAX),
            Some(duration),
        )),
        _ => {}
    }

    violations
}
