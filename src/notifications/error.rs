use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Mail transport error: {0}")]
    Transport(String),
}
