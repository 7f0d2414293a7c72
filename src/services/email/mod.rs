// Email Service Module
// Notification sends are fire-and-forget at the call sites: handlers and
// webhook reconciliation spawn the send and only ever log a failure.

pub mod builders;
pub mod sender;
pub mod types;

use self::types::EmailBuilder;
use crate::app_config::EmailConfig;
use anyhow::Result;
use builders::{SubscriptionActivatedEmailBuilder, WelcomeEmailBuilder};
use handlebars::Handlebars;
use sender::EmailSender;
use std::sync::Arc;
use tracing::{info, instrument};

/// Email service for sending various types of emails
#[derive(Clone)]
pub struct EmailService {
    sender: EmailSender,
    config: EmailConfig,
    templates: Arc<Handlebars<'static>>,
}

impl EmailService {
    /// Create a new email service instance
    pub fn new(config: EmailConfig) -> Result<Self> {
        let mut templates = Handlebars::new();

        Self::register_templates(&mut templates)?;

        let sender = EmailSender::new(config.api_url.clone(), config.api_key.clone())
            .with_max_retries(3)
            .with_retry_delay(std::time::Duration::from_secs(1));

        Ok(Self {
            sender,
            config,
            templates: Arc::new(templates),
        })
    }

    /// Register all email templates
    fn register_templates(templates: &mut Handlebars) -> Result<(), types::EmailError> {
        let welcome_template = include_str!("../../../templates/email/welcome.html");
        templates
            .register_template_string("welcome", welcome_template)
            .map_err(|e| types::EmailError::TemplateError(e.to_string()))?;

        let subscription_template =
            include_str!("../../../templates/email/subscription_activated.html");
        templates
            .register_template_string("subscription_activated", subscription_template)
            .map_err(|e| types::EmailError::TemplateError(e.to_string()))?;

        Ok(())
    }

    /// Send the welcome email after account creation
    #[instrument(skip(self))]
    pub async fn send_welcome_email(
        &self,
        to_email: &str,
        user_name: &str,
    ) -> Result<(), types::EmailError> {
        info!("Sending welcome email to {}", to_email);

        let builder = WelcomeEmailBuilder::new(to_email, user_name, &self.config, &self.templates);

        let message = builder.build()?;
        self.sender.send_with_retry(message).await
    }

    /// Send the subscription-activated notification
    #[instrument(skip(self))]
    pub async fn send_subscription_activated_email(
        &self,
        to_email: &str,
        user_name: &str,
        plan_name: &str,
    ) -> Result<(), types::EmailError> {
        info!("Sending subscription activation email to {}", to_email);

        let builder = SubscriptionActivatedEmailBuilder::new(
            to_email,
            user_name,
            plan_name,
            &self.config,
            &self.templates,
        );

        let message = builder.build()?;
        self.sender.send_with_retry(message).await
    }
}

// Re-export commonly used types for convenience
pub use types::{EmailError, EmailMessage};

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> EmailConfig {
        EmailConfig {
            api_key: "test_key".to_string(),
            api_url: "https://api.resend.com/emails".to_string(),
            from_email: "noreply@test.com".to_string(),
            from_name: "Test App".to_string(),
            support_email: "support@test.com".to_string(),
            app_name: "Test App".to_string(),
            frontend_url: "https://app.test.com".to_string(),
        }
    }

    #[test]
    fn test_email_service_creation() {
        let service = EmailService::new(create_test_config());
        assert!(service.is_ok());
    }

    #[test]
    fn test_welcome_email_renders() {
        let service = EmailService::new(create_test_config()).unwrap();
        let builder = WelcomeEmailBuilder::new(
            "user@example.com",
            "Jane",
            &service.config,
            &service.templates,
        );

        let message = builder.build().unwrap();
        assert_eq!(message.to, vec!["user@example.com"]);
        assert!(message.subject.contains("Welcome"));
        assert!(message.html.contains("Jane"));
        assert!(message.html.contains("https://app.test.com"));
    }

    #[test]
    fn test_subscription_email_renders_plan() {
        let service = EmailService::new(create_test_config()).unwrap();
        let builder = SubscriptionActivatedEmailBuilder::new(
            "user@example.com",
            "Jane",
            "pro",
            &service.config,
            &service.templates,
        );

        let message = builder.build().unwrap();
        assert!(message.html.contains("pro"));
        assert!(message.subject.contains("subscription is active"));
    }
}
