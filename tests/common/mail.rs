//! Mail transport recording what would have been sent.

use async_trait::async_trait;
use derivative_server::notifications::{MailTransport, NotificationError};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct SentMail {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingMailTransport {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailTransport {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingMailTransport {
    async fn send(
        &self,
        sender: &str,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(SentMail {
            sender: sender.to_string(),
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
