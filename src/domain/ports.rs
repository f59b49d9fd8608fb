use crate::domain::model::{PaymentRequest, PostStatus, PurchaseTicketRequest, SocialMediaPost, User};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 圖片等二進位輸出的存放位置（本機檔案系統或 S3）
pub trait ObjectStore: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_recurring_payment(&self, credit_card: &str, payment_id: &str) -> Result<String>;
    async fn remove_recurring_payment(&self, payment_id: &str) -> Result<()>;
    async fn charge(&self, idempotency_key: &str, amount: f64) -> Result<bool>;
    /// 啟動外部付款，外部系統完成後會透過 `confirmation_id` 回呼
    async fn init_payment(&self, request: &PaymentRequest, confirmation_id: &str) -> Result<String>;
    async fn cancel_payment(&self, payment_ref: &str) -> Result<()>;
}

#[async_trait]
pub trait SubscriptionApi: Send + Sync {
    async fn create_subscription(
        &self,
        user_id: &str,
        subscription: &str,
        payment_ref: &str,
    ) -> Result<String>;
    async fn remove_subscription(&self, user_id: &str, subscription: &str) -> Result<()>;
}

#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send_email_with_link(&self, user_id: &str, user: &User, secret: &str) -> Result<()>;
    async fn notify_payment_success(&self, user_id: &str) -> Result<bool>;
    async fn notify_payment_failure(&self, user_id: &str) -> Result<bool>;
    async fn email_ticket(&self, request: &PurchaseTicketRequest) -> Result<()>;
    async fn send_reminder(&self, request: &PurchaseTicketRequest) -> Result<()>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn create_user_entry(&self, user: &User) -> Result<()>;
    /// 回傳使用者 id，或在下游尚未就緒時回傳 `NOT_READY`
    async fn update_user_profile(&self, profile: &str) -> Result<String>;
    async fn set_user_permissions(&self, user_id: &str, permissions: &str) -> Result<String>;
    async fn provision_resources(&self, user_id: &str, role: &str, resources: &str) -> Result<()>;
}

#[async_trait]
pub trait ContentModeration: Send + Sync {
    async fn create_post(&self, user_id: &str, post: &SocialMediaPost) -> Result<String>;
    async fn get_post_status(&self, post_id: &str) -> Result<PostStatus>;
    async fn update_user_feed(&self, user_id: &str, post_id: &str) -> Result<()>;
}
