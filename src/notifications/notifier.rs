//! Status notifications for job observers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::error::NotificationError;
use super::templates::{render, NotificationTemplates};
use super::transport::MailTransport;
use crate::download_jobs::{DownloadJob, JobStatus};
use crate::metrics;

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationSettings {
    /// From address of every message.
    pub sender: String,
    /// Public URL prefix of downloadable artifacts, used for `{download_url}`.
    pub download_base_url: Option<String>,
    pub templates: NotificationTemplates,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            sender: "noreply@localhost".to_string(),
            download_base_url: None,
            templates: NotificationTemplates::default(),
        }
    }
}

/// Tells a job's observers it became READY or ERROR.
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    settings: NotificationSettings,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>, settings: NotificationSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Notify `job`'s observers about `status`.
    ///
    /// Returns false without sending when there are no observers or the status is not
    /// READY/ERROR. The caller owns clearing the observers after a successful send.
    pub async fn notify(
        &self,
        job: &DownloadJob,
        status: JobStatus,
    ) -> Result<bool, NotificationError> {
        let (subject_template, body_template) = match status {
            JobStatus::Ready => (
                &self.settings.templates.ready_subject,
                &self.settings.templates.ready_body,
            ),
            JobStatus::Error => (
                &self.settings.templates.error_subject,
                &self.settings.templates.error_body,
            ),
            _ => {
                debug!(
                    "No notification for job {} in status {}",
                    job.identifier,
                    status.as_db_str()
                );
                return Ok(false);
            }
        };
        if job.observers.is_empty() {
            debug!("Job {} has no observers to notify", job.identifier);
            return Ok(false);
        }

        let values = self.placeholder_values(job);
        let subject = render(subject_template, &values)?;
        let body = render(body_template, &values)?;

        let result = self.send(&job.observers, &subject, &body).await;
        metrics::record_notification(
            status.as_db_str(),
            if result.is_ok() { "sent" } else { "failed" },
        );
        match &result {
            Ok(true) => info!(
                "Notified {} observers of job {} ({})",
                job.observers.len(),
                job.identifier,
                status.as_db_str()
            ),
            Ok(false) => {}
            Err(e) => warn!("Failed to notify observers of job {}: {}", job.identifier, e),
        }
        result
    }

    /// Send one message to every observer. Returns false when there is nobody to send to.
    pub async fn send(
        &self,
        observers: &[String],
        subject: &str,
        body: &str,
    ) -> Result<bool, NotificationError> {
        if observers.is_empty() {
            return Ok(false);
        }
        self.transport
            .send(&self.settings.sender, observers, subject, body)
            .await?;
        Ok(true)
    }

    fn placeholder_values(&self, job: &DownloadJob) -> HashMap<&'static str, String> {
        let expiration = DateTime::<Utc>::from_timestamp_millis(job.expires_at());
        let download_url = match &self.settings.download_base_url {
            Some(base) => format!(
                "{}/{}/{}{}",
                base.trim_end_matches('/'),
                job.artifact_type.as_str(),
                job.identifier,
                job.artifact_type.spec().extension
            ),
            None => job.identifier.clone(),
        };

        HashMap::from([
            ("source_id", job.source_id.clone()),
            ("type", job.artifact_type.spec().display_name.to_string()),
            ("identifier", job.identifier.clone()),
            (
                "expiration_date",
                expiration
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
            (
                "expiration_time",
                expiration
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_default(),
            ),
            ("message", job.message.clone().unwrap_or_default()),
            ("download_url", download_url),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download_jobs::ArtifactType;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, Vec<String>, String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(
            &self,
            sender: &str,
            recipients: &[String],
            subject: &str,
            body: &str,
        ) -> Result<(), NotificationError> {
            if self.fail {
                return Err(NotificationError::Transport("relay down".to_string()));
            }
            self.sent.lock().unwrap().push((
                sender.to_string(),
                recipients.to_vec(),
                subject.to_string(),
                body.to_string(),
            ));
            Ok(())
        }
    }

    fn job_with_observers() -> DownloadJob {
        // 2024-01-01T00:00:00Z plus one hour of TTL
        let mut job = DownloadJob::new(ArtifactType::Pdf, "REC1", "", 3_600_000, 1_704_067_200_000);
        job.add_observer("a@x.com");
        job.add_observer("b@x.com");
        job
    }

    fn notifier(transport: Arc<RecordingTransport>) -> Notifier {
        let settings = NotificationSettings {
            download_base_url: Some("https://example.org/downloads/".to_string()),
            ..Default::default()
        };
        Notifier::new(transport, settings)
    }

    #[tokio::test]
    async fn test_ready_notification() {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = notifier(transport.clone());
        let job = job_with_observers();

        assert!(notifier.notify(&job, JobStatus::Ready).await.unwrap());

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (sender, recipients, subject, body) = &sent[0];
        assert_eq!(sender, "noreply@localhost");
        assert_eq!(recipients, &vec!["a@x.com".to_string(), "b@x.com".to_string()]);
        assert_eq!(subject, "Your PDF download of REC1 is ready");
        assert!(body.contains(&format!(
            "https://example.org/downloads/pdf/{}.pdf",
            job.identifier
        )));
        assert!(body.contains("2024-01-01 01:00"));
    }

    #[tokio::test]
    async fn test_error_notification_carries_message() {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = notifier(transport.clone());
        let mut job = job_with_observers();
        job.message = Some("renderer crashed".to_string());

        assert!(notifier.notify(&job, JobStatus::Error).await.unwrap());

        let sent = transport.sent.lock().unwrap();
        assert!(sent[0].3.contains("renderer crashed"));
    }

    #[tokio::test]
    async fn test_no_observers_is_noop() {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = notifier(transport.clone());
        let job = DownloadJob::new(ArtifactType::Epub, "REC1", "", 60_000, 0);

        assert!(!notifier.notify(&job, JobStatus::Ready).await.unwrap());
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_statuses_are_not_notified() {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = notifier(transport.clone());
        let job = job_with_observers();

        for status in [JobStatus::Waiting, JobStatus::Initialized, JobStatus::Deleted] {
            assert!(!notifier.notify(&job, status).await.unwrap());
        }
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let notifier = notifier(transport);

        let err = notifier
            .notify(&job_with_observers(), JobStatus::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Transport(_)));
    }

    #[tokio::test]
    async fn test_template_failure_propagates() {
        let transport = Arc::new(RecordingTransport::default());
        let mut settings = NotificationSettings::default();
        settings.templates.ready_subject = "{unknown}".to_string();
        let notifier = Notifier::new(transport.clone(), settings);

        let err = notifier
            .notify(&job_with_observers(), JobStatus::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Template(_)));
        assert!(transport.sent.lock().unwrap().is_empty());
    }
}
