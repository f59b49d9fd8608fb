#![allow(dead_code)]

use async_trait::async_trait;
use durable_patterns::config::toml_config::ServicesConfig;
use durable_patterns::domain::model::{
    PaymentRequest, PostStatus, PurchaseTicketRequest, SocialMediaPost, User,
};
use durable_patterns::domain::ports::{
    ContentModeration, EmailClient, PaymentGateway, SubscriptionApi, UserDirectory,
};
use durable_patterns::{
    build_endpoint, DurableError, ExternalClients, LocalRuntime, LocalStorage, Result, RetryPolicy,
};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 依序記錄 stub 被呼叫的情形
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.all().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn find(&self, prefix: &str) -> Option<String> {
        self.all()
            .into_iter()
            .find(|c| c.starts_with(prefix))
            .map(|c| c[prefix.len()..].to_string())
    }
}

pub fn fast_retries() -> RetryPolicy {
    RetryPolicy::exponential()
        .with_max_attempts(3)
        .with_initial_interval(Duration::from_millis(1))
        .with_max_interval(Duration::from_millis(5))
}

pub fn fast_services() -> ServicesConfig {
    ServicesConfig {
        poll_interval_ms: 100,
        reservation_ttl_secs: 15 * 60,
        payment_timeout_secs: 30,
        payment_expiry_secs: 24 * 60 * 60,
        image_output_dir: "generated-images".to_string(),
    }
}

pub fn runtime_with(clients: &ExternalClients, output_dir: &Path, services: &ServicesConfig) -> LocalRuntime {
    let endpoint = build_endpoint(clients, LocalStorage::new(output_dir), services);
    LocalRuntime::new(endpoint, fast_retries())
}

pub fn reliable_runtime() -> LocalRuntime {
    runtime_with(
        &ExternalClients::reliable(),
        &std::env::temp_dir(),
        &fast_services(),
    )
}

/// Waits until `probe` returns a value; used to pick up awakeable ids.
pub async fn wait_for<T>(probe: impl Fn() -> Option<T>) -> T {
    loop {
        if let Some(value) = probe() {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[derive(Debug, Default)]
pub struct RecordingPayments {
    pub calls: Calls,
    pub decline: bool,
}

#[async_trait]
impl PaymentGateway for RecordingPayments {
    async fn create_recurring_payment(&self, _credit_card: &str, payment_id: &str) -> Result<String> {
        self.calls.push(format!("create payment {}", payment_id));
        Ok("payRef-1".to_string())
    }

    async fn remove_recurring_payment(&self, _payment_id: &str) -> Result<()> {
        self.calls.push("remove payment");
        Ok(())
    }

    async fn charge(&self, _idempotency_key: &str, amount: f64) -> Result<bool> {
        self.calls.push(format!("charge {}", amount));
        Ok(!self.decline)
    }

    async fn init_payment(&self, request: &PaymentRequest, confirmation_id: &str) -> Result<String> {
        self.calls.push(format!("init {}", confirmation_id));
        Ok(format!("payRef-{}", request.order_id))
    }

    async fn cancel_payment(&self, payment_ref: &str) -> Result<()> {
        self.calls.push(format!("cancel {}", payment_ref));
        Ok(())
    }
}

/// `terminal_on` 的訂閱直接失敗；`transient_on` 的訂閱永遠暫時性失敗；
/// 其他訂閱先暫時失敗 `flaky_attempts` 次
#[derive(Debug, Default)]
pub struct RecordingSubscriptions {
    pub calls: Calls,
    pub terminal_on: Option<String>,
    pub transient_on: Option<String>,
    pub flaky_attempts: AtomicU32,
}

#[async_trait]
impl SubscriptionApi for RecordingSubscriptions {
    async fn create_subscription(
        &self,
        _user_id: &str,
        subscription: &str,
        _payment_ref: &str,
    ) -> Result<String> {
        self.calls.push(format!("create {}", subscription));
        if self.terminal_on.as_deref() == Some(subscription) {
            return Err(DurableError::terminal(format!("{} is not available", subscription)));
        }
        if self.transient_on.as_deref() == Some(subscription) {
            return Err(DurableError::transient(format!("{} is down", subscription)));
        }
        let flaky = self
            .flaky_attempts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if flaky {
            return Err(DurableError::transient("👻 flaky subscription api"));
        }
        Ok("SUCCESS".to_string())
    }

    async fn remove_subscription(&self, _user_id: &str, subscription: &str) -> Result<()> {
        self.calls.push(format!("remove {}", subscription));
        Ok(())
    }
}

/// 前 `not_ready` 次回傳 NOT_READY
#[derive(Debug, Default)]
pub struct SlowUserDirectory {
    pub calls: Calls,
    pub not_ready: AtomicU32,
}

#[async_trait]
impl UserDirectory for SlowUserDirectory {
    async fn create_user_entry(&self, user: &User) -> Result<()> {
        self.calls.push(format!("create user {}", user.name));
        Ok(())
    }

    async fn update_user_profile(&self, profile: &str) -> Result<String> {
        self.calls.push(format!("update profile {}", profile));
        let not_ready = self
            .not_ready
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if not_ready {
            return Ok("NOT_READY".to_string());
        }
        Ok(format!("{}-id", profile))
    }

    async fn set_user_permissions(&self, user_id: &str, permissions: &str) -> Result<String> {
        self.calls.push(format!("permissions {} {}", user_id, permissions));
        Ok(permissions.to_string())
    }

    async fn provision_resources(&self, user_id: &str, role: &str, resources: &str) -> Result<()> {
        self.calls
            .push(format!("provision {} {} {}", user_id, role, resources));
        Ok(())
    }
}

/// 前 `pending_checks` 次狀態查詢回傳 PENDING
#[derive(Debug, Default)]
pub struct SlowModeration {
    pub calls: Calls,
    pub pending_checks: AtomicU32,
}

#[async_trait]
impl ContentModeration for SlowModeration {
    async fn create_post(&self, user_id: &str, _post: &SocialMediaPost) -> Result<String> {
        self.calls.push(format!("create post {}", user_id));
        Ok(format!("post-{}", user_id))
    }

    async fn get_post_status(&self, _post_id: &str) -> Result<PostStatus> {
        self.calls.push("status");
        let pending = self
            .pending_checks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(if pending {
            PostStatus::Pending
        } else {
            PostStatus::Approved
        })
    }

    async fn update_user_feed(&self, user_id: &str, post_id: &str) -> Result<()> {
        self.calls.push(format!("feed {} {}", user_id, post_id));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingEmail {
    pub calls: Calls,
}

#[async_trait]
impl EmailClient for RecordingEmail {
    async fn send_email_with_link(&self, user_id: &str, _user: &User, secret: &str) -> Result<()> {
        self.calls.push(format!("link {} {}", user_id, secret));
        Ok(())
    }

    async fn notify_payment_success(&self, user_id: &str) -> Result<bool> {
        self.calls.push(format!("success {}", user_id));
        Ok(true)
    }

    async fn notify_payment_failure(&self, user_id: &str) -> Result<bool> {
        self.calls.push(format!("failure {}", user_id));
        Ok(false)
    }

    async fn email_ticket(&self, request: &PurchaseTicketRequest) -> Result<()> {
        self.calls.push(format!("ticket {}", request.ticket_id));
        Ok(())
    }

    async fn send_reminder(&self, request: &PurchaseTicketRequest) -> Result<()> {
        self.calls.push(format!("reminder {}", request.ticket_id));
        Ok(())
    }
}
