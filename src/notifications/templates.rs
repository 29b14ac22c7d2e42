//! Subject/body templates with `{placeholder}` substitution.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::error::NotificationError;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([a-z_]+)\}").unwrap();
}

/// Templates for the two notifiable statuses.
///
/// Available placeholders: `{source_id}`, `{type}`, `{identifier}`, `{expiration_date}`,
/// `{expiration_time}`, `{message}`, `{download_url}`.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationTemplates {
    pub ready_subject: String,
    pub ready_body: String,
    pub error_subject: String,
    pub error_body: String,
}

impl Default for NotificationTemplates {
    fn default() -> Self {
        Self {
            ready_subject: "Your {type} download of {source_id} is ready".to_string(),
            ready_body: "The {type} file of {source_id} has been generated.\n\n\
                         Download it from {download_url}\n\n\
                         The file stays available until {expiration_date} {expiration_time} UTC."
                .to_string(),
            error_subject: "Your {type} download of {source_id} failed".to_string(),
            error_body: "The {type} file of {source_id} could not be generated.\n\n\
                         Reason: {message}"
                .to_string(),
        }
    }
}

/// Replace every `{name}` in `template` with `values[name]`.
///
/// An unknown placeholder is an error rather than being left in the output.
pub fn render(template: &str, values: &HashMap<&str, String>) -> Result<String, NotificationError> {
    let mut missing = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        match values.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(NotificationError::Template(format!(
            "unknown placeholder {{{}}}",
            name
        ))),
        None => Ok(rendered.into_owned()),
    }
}
