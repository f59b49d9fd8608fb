use crate::core::{decode_input, encode_output, unknown_handler, Context, HandlerDef, Service, ServiceKind};
use crate::domain::model::{SubscriptionRequest, SubscriptionResult};
use crate::domain::ports::{PaymentGateway, SubscriptionApi};
use crate::utils::error::Result;
use crate::utils::validation::require_non_empty;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;

/// Same flow as `SubscriptionService`, but the subscriptions are created concurrently.
pub struct ParallelSubscriptionService {
    payments: Arc<dyn PaymentGateway>,
    subscriptions: Arc<dyn SubscriptionApi>,
}

impl ParallelSubscriptionService {
    pub fn new(payments: Arc<dyn PaymentGateway>, subscriptions: Arc<dyn SubscriptionApi>) -> Self {
        Self {
            payments,
            subscriptions,
        }
    }

    pub async fn add(&self, ctx: &Context, req: SubscriptionRequest) -> Result<SubscriptionResult> {
        require_non_empty("userId", &req.user_id)?;
        let payment_id = ctx.rand_uuid().to_string();

        let pay_ref = ctx
            .run("pay", || {
                self.payments
                    .create_recurring_payment(&req.credit_card, &payment_id)
            })
            .await?;

        // 先啟動全部，再一起等待
        let api = &self.subscriptions;
        let user_id = req.user_id.as_str();
        let payment_ref = pay_ref.as_str();
        let pending = req.subscriptions.iter().map(move |subscription| {
            ctx.run(format!("add-{}", subscription), move || {
                api.create_subscription(user_id, subscription, payment_ref)
            })
        });
        let created = try_join_all(pending).await?;
        tracing::info!(count = created.len(), "All subscriptions created");

        Ok(SubscriptionResult {
            success: true,
            payment_ref: pay_ref,
        })
    }
}

#[async_trait]
impl Service for ParallelSubscriptionService {
    fn name(&self) -> &'static str {
        "ParallelSubscriptionService"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Service
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[HandlerDef::new("add")];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "add" => encode_output(self.add(&ctx, decode_input(input)?).await?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
