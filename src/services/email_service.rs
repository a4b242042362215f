use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::job::Job;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl EmailMessage {
    pub fn job_assignment(to: &str, job: &Job) -> Self {
        let dates = match (job.start_date, job.expected_closing_date) {
            (Some(start), Some(close)) => format!("\n\nStart Date: {}\nExpected Closing Date: {}", start, close),
            (Some(start), None) => format!("\n\nStart Date: {}", start),
            _ => String::new(),
        };
        Self {
            to: to.to_string(),
            subject: format!("New Job Assignment: {}", job.title),
            text: format!(
                "You have been assigned to the job \"{}\".\n\nDescription: {}{}\n\nLog in to view details and start working on this job.",
                job.title, job.description, dates
            ),
        }
    }

    pub fn candidate_added(to: &str, candidate_name: &str, job_title: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("New Candidate for {}", job_title),
            text: format!(
                "A new candidate, {}, has been uploaded for the job \"{}\".",
                candidate_name, job_title
            ),
        }
    }

    pub fn status_change(to: &str, candidate_name: &str, new_status: &str, job_title: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("Candidate Status Update: {}", candidate_name),
            text: format!(
                "Candidate {} for job \"{}\" has been moved to {}.",
                candidate_name, job_title, new_status
            ),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// Hands messages to an HTTP mail relay.
#[derive(Clone)]
pub struct RelayEmailSender {
    client: Client,
    relay_url: String,
}

impl RelayEmailSender {
    pub fn new(client: Client, relay_url: String) -> Self {
        Self { client, relay_url }
    }
}

#[async_trait]
impl EmailSender for RelayEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let resp = self.client.post(&self.relay_url).json(&message).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Internal(format!(
                "mail relay rejected message to {}: {} {}",
                message.to, status, body
            )));
        }
        tracing::debug!(to = %message.to, subject = %message.subject, "email relayed");
        Ok(())
    }
}

/// Used when no relay is configured.
#[derive(Clone, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        tracing::info!(to = %message.to, subject = %message.subject, body = %message.text, "email notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_change_message_names_candidate_and_job() {
        let msg = EmailMessage::status_change("hm@acme.test", "Ada", "offer", "Engineer");
        assert_eq!(msg.subject, "Candidate Status Update: Ada");
        assert_eq!(msg.text, "Candidate Ada for job \"Engineer\" has been moved to offer.");
    }
}
