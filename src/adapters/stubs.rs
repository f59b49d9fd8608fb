//! Mock external systems used by the examples.
//!
//! Each client logs what it would do and returns a canned (or random) value.
//! Failures are injected with the probabilities from [`StubsConfig`] and are
//! always transient, so the runtime retries them inside `run`.

use crate::config::toml_config::StubsConfig;
use crate::domain::model::{PaymentRequest, PostStatus, PurchaseTicketRequest, SocialMediaPost, User};
use crate::domain::ports::{
    ContentModeration, EmailClient, PaymentGateway, SubscriptionApi, UserDirectory,
};
use crate::utils::error::{DurableError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

fn chance(rate: f64) -> bool {
    rate > 0.0 && rand::random::<f64>() < rate
}

fn maybe_fail(rate: f64, message: impl FnOnce() -> String) -> Result<()> {
    if chance(rate) {
        let message = format!("👻 {}", message());
        tracing::error!("{}", message);
        return Err(DurableError::transient(message));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct MockPaymentGateway {
    failure_rate: f64,
}

impl MockPaymentGateway {
    pub fn new(failure_rate: f64) -> Self {
        Self { failure_rate }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_recurring_payment(&self, _credit_card: &str, payment_id: &str) -> Result<String> {
        maybe_fail(self.failure_rate, || {
            format!("Failed to create recurring payment: {}", payment_id)
        })?;
        tracing::info!("Creating recurring payment {}", payment_id);
        Ok(format!("payRef-{}", Uuid::new_v4()))
    }

    async fn remove_recurring_payment(&self, payment_id: &str) -> Result<()> {
        tracing::info!("Removing recurring payment: {}", payment_id);
        Ok(())
    }

    async fn charge(&self, idempotency_key: &str, amount: f64) -> Result<bool> {
        maybe_fail(self.failure_rate, || {
            format!("Failed to charge {} (key {})", amount, idempotency_key)
        })?;
        tracing::info!("Charging {:.2} with idempotency key {}", amount, idempotency_key);
        Ok(true)
    }

    async fn init_payment(&self, request: &PaymentRequest, confirmation_id: &str) -> Result<String> {
        tracing::info!(
            ">>> Initiating external payment {} of {} {} for order {}",
            confirmation_id,
            request.amount,
            request.currency,
            request.order_id
        );
        tracing::info!(
            "  Confirm the payment via: curl localhost:9080/Payments/confirm --json '{{\"id\": \"{}\", \"result\": {{\"success\": true, \"transactionId\": \"txn-123\"}}}}'",
            confirmation_id
        );
        Ok(format!("payRef-{}", Uuid::new_v4()))
    }

    async fn cancel_payment(&self, payment_ref: &str) -> Result<()> {
        tracing::info!(">>> Canceling external payment with ref {}", payment_ref);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockSubscriptionApi {
    failure_rate: f64,
}

impl MockSubscriptionApi {
    pub fn new(failure_rate: f64) -> Self {
        Self { failure_rate }
    }
}

#[async_trait]
impl SubscriptionApi for MockSubscriptionApi {
    async fn create_subscription(
        &self,
        user_id: &str,
        subscription: &str,
        payment_ref: &str,
    ) -> Result<String> {
        maybe_fail(self.failure_rate, || {
            format!("Failed to create subscription: {} - {}", user_id, subscription)
        })?;
        tracing::info!(
            "Creating subscription {} for user {} (paymentRef {})",
            subscription,
            user_id,
            payment_ref
        );
        Ok("SUCCESS".to_string())
    }

    async fn remove_subscription(&self, user_id: &str, subscription: &str) -> Result<()> {
        tracing::info!("Removing subscription {} for user {}", subscription, user_id);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockEmailClient;

#[async_trait]
impl EmailClient for MockEmailClient {
    async fn send_email_with_link(&self, user_id: &str, user: &User, secret: &str) -> Result<()> {
        tracing::info!(
            "Sending email to {} with secret {}. To simulate a user clicking the link, run: curl localhost:9080/SignupWorkflow/{}/click --json '\"{}\"'",
            user.email,
            secret,
            user_id,
            secret
        );
        Ok(())
    }

    async fn notify_payment_success(&self, user_id: &str) -> Result<bool> {
        tracing::info!("Notifying user {} of payment success", user_id);
        Ok(true)
    }

    async fn notify_payment_failure(&self, user_id: &str) -> Result<bool> {
        tracing::info!("Notifying user {} of payment failure", user_id);
        Ok(true)
    }

    async fn email_ticket(&self, request: &PurchaseTicketRequest) -> Result<()> {
        tracing::info!(
            "Sending ticket {} to {} for concert on {}",
            request.ticket_id,
            request.customer_email,
            request.concert_date_time
        );
        Ok(())
    }

    async fn send_reminder(&self, request: &PurchaseTicketRequest) -> Result<()> {
        tracing::info!(
            "Sending reminder for concert on {} to {}",
            request.concert_date_time,
            request.customer_email
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockUserDirectory {
    not_ready_rate: f64,
}

impl MockUserDirectory {
    pub fn new(not_ready_rate: f64) -> Self {
        Self { not_ready_rate }
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn create_user_entry(&self, user: &User) -> Result<()> {
        tracing::info!("Creating user entry for {}", user.name);
        Ok(())
    }

    async fn update_user_profile(&self, profile: &str) -> Result<String> {
        if chance(self.not_ready_rate) {
            tracing::info!("Profile service not ready for {}", profile);
            return Ok("NOT_READY".to_string());
        }
        Ok(format!("{}-id", profile))
    }

    async fn set_user_permissions(&self, user_id: &str, permissions: &str) -> Result<String> {
        tracing::info!("Setting permissions {} for user {}", permissions, user_id);
        Ok(permissions.to_string())
    }

    async fn provision_resources(&self, user_id: &str, role: &str, resources: &str) -> Result<()> {
        tracing::info!(
            "Provisioning resources {} for user {} with role {}",
            resources,
            user_id,
            role
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockContentModeration {
    pending_rate: f64,
}

impl MockContentModeration {
    pub fn new(pending_rate: f64) -> Self {
        Self { pending_rate }
    }
}

#[async_trait]
impl ContentModeration for MockContentModeration {
    async fn create_post(&self, user_id: &str, post: &SocialMediaPost) -> Result<String> {
        let post_id = format!("post-{}", Uuid::new_v4());
        tracing::info!(
            "Created post {} for user {} ({} bytes, {})",
            post_id,
            user_id,
            post.content.len(),
            post.metadata
        );
        Ok(post_id)
    }

    async fn get_post_status(&self, post_id: &str) -> Result<PostStatus> {
        let status = if chance(self.pending_rate) {
            PostStatus::Pending
        } else {
            PostStatus::Approved
        };
        tracing::info!("Content moderation for post {} is {:?}", post_id, status);
        Ok(status)
    }

    async fn update_user_feed(&self, user_id: &str, post_id: &str) -> Result<()> {
        tracing::info!("Updating the user feed for user {} with post {}", user_id, post_id);
        Ok(())
    }
}

/// 範例所使用的全部外部系統
#[derive(Clone)]
pub struct ExternalClients {
    pub payments: Arc<dyn PaymentGateway>,
    pub subscriptions: Arc<dyn SubscriptionApi>,
    pub email: Arc<dyn EmailClient>,
    pub users: Arc<dyn UserDirectory>,
    pub moderation: Arc<dyn ContentModeration>,
}

impl ExternalClients {
    pub fn mock(config: &StubsConfig) -> Self {
        Self {
            payments: Arc::new(MockPaymentGateway::new(config.failure_rate)),
            subscriptions: Arc::new(MockSubscriptionApi::new(config.failure_rate)),
            email: Arc::new(MockEmailClient),
            users: Arc::new(MockUserDirectory::new(config.not_ready_rate)),
            moderation: Arc::new(MockContentModeration::new(config.pending_rate)),
        }
    }

    /// 不會失敗的 mocks，方便測試
    pub fn reliable() -> Self {
        Self::mock(&StubsConfig::reliable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reliable_stubs_never_fail() {
        let clients = ExternalClients::reliable();
        for _ in 0..20 {
            assert!(clients
                .payments
                .create_recurring_payment("1234", "p1")
                .await
                .is_ok());
            assert_eq!(clients.users.update_user_profile("bob").await.unwrap(), "bob-id");
            assert_eq!(
                clients.moderation.get_post_status("post-1").await.unwrap(),
                PostStatus::Approved
            );
        }
    }

    #[tokio::test]
    async fn test_failing_stub_returns_transient_error() {
        let api = MockSubscriptionApi::new(1.0);
        let err = api.create_subscription("sam", "Netflix", "ref").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Netflix"));
    }
}
