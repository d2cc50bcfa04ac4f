//! Outbound template-message provider.

use async_trait::async_trait;

use crate::types::{SendOutcome, TemplateMessage, WhatsAppCredentials};

/// Sends a pre-approved template message.
///
/// Implementations never return an error: transport and provider failures are
/// folded into [`SendOutcome::Failed`] so the caller can log and move on.
/// One call means at most one network request, no internal retries.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn send_template(
        &self,
        credentials: &WhatsAppCredentials,
        message: &TemplateMessage,
    ) -> SendOutcome;
}
