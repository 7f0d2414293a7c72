// Email builders - assemble concrete notification messages from templates

use super::types::{
    EmailBuilder, EmailError, EmailMessage, SubscriptionActivatedEmailData, WelcomeEmailData,
};
use crate::app_config::EmailConfig;
use handlebars::Handlebars;

/// Builder for the welcome email sent after registration or first OAuth login
pub struct WelcomeEmailBuilder<'a> {
    to_email: &'a str,
    user_name: &'a str,
    config: &'a EmailConfig,
    templates: &'a Handlebars<'static>,
}

impl<'a> WelcomeEmailBuilder<'a> {
    pub fn new(
        to_email: &'a str,
        user_name: &'a str,
        config: &'a EmailConfig,
        templates: &'a Handlebars<'static>,
    ) -> Self {
        Self {
            to_email,
            user_name,
            config,
            templates,
        }
    }
}

impl EmailBuilder for WelcomeEmailBuilder<'_> {
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let data = WelcomeEmailData {
            user_name: self.user_name.to_string(),
            app_name: self.config.app_name.clone(),
            app_url: self.config.frontend_url.clone(),
            support_email: self.config.support_email.clone(),
        };

        let html = self
            .templates
            .render("welcome", &data)
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        Ok(EmailMessage::new(
            format!("{} <{}>", self.config.from_name, self.config.from_email),
            vec![self.to_email.to_string()],
            format!("Welcome to {}", self.config.app_name),
            html,
        )
        .with_reply_to(self.config.support_email.clone()))
    }
}

/// Builder for the subscription-activated notification
pub struct SubscriptionActivatedEmailBuilder<'a> {
    to_email: &'a str,
    user_name: &'a str,
    plan_name: &'a str,
    config: &'a EmailConfig,
    templates: &'a Handlebars<'static>,
}

impl<'a> SubscriptionActivatedEmailBuilder<'a> {
    pub fn new(
        to_email: &'a str,
        user_name: &'a str,
        plan_name: &'a str,
        config: &'a EmailConfig,
        templates: &'a Handlebars<'static>,
    ) -> Self {
        Self {
            to_email,
            user_name,
            plan_name,
            config,
            templates,
        }
    }
}

impl EmailBuilder for SubscriptionActivatedEmailBuilder<'_> {
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let data = SubscriptionActivatedEmailData {
            user_name: self.user_name.to_string(),
            plan_name: self.plan_name.to_string(),
            app_name: self.config.app_name.clone(),
            app_url: self.config.frontend_url.clone(),
            support_email: self.config.support_email.clone(),
        };

        let html = self
            .templates
            .render("subscription_activated", &data)
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        Ok(EmailMessage::new(
            format!("{} <{}>", self.config.from_name, self.config.from_email),
            vec![self.to_email.to_string()],
            format!("Your {} subscription is active", self.config.app_name),
            html,
        )
        .with_reply_to(self.config.support_email.clone()))
    }
}
