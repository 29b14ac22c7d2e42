//! Observer notifications
//!
//! Renders READY / ERROR messages for a job and hands them to a [`MailTransport`].

mod error;
mod notifier;
mod templates;
mod transport;

pub use error::NotificationError;
pub use notifier::{NotificationSettings, Notifier};
pub use templates::{render, NotificationTemplates};
pub use transport::{HttpMailRelay, LogMailTransport, MailTransport};
