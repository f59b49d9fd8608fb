//! Durable execution: every external call runs as a side effect, so a failed
//! call is retried on its own without repeating the ones that succeeded.

use crate::core::{decode_input, encode_output, unknown_handler, Context, HandlerDef, Service, ServiceKind};
use crate::domain::model::SubscriptionRequest;
use crate::domain::ports::{PaymentGateway, SubscriptionApi};
use crate::utils::error::Result;
use crate::utils::validation::require_non_empty;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub struct SubscriptionService {
    payments: Arc<dyn PaymentGateway>,
    subscriptions: Arc<dyn SubscriptionApi>,
}

impl SubscriptionService {
    pub fn new(payments: Arc<dyn PaymentGateway>, subscriptions: Arc<dyn SubscriptionApi>) -> Self {
        Self {
            payments,
            subscriptions,
        }
    }

    pub async fn add(&self, ctx: &Context, req: SubscriptionRequest) -> Result<()> {
        require_non_empty("userId", &req.user_id)?;

        // 穩定的付款 id，重試時不會改變
        let payment_id = ctx.rand_uuid().to_string();

        let pay_ref = ctx
            .run("recurring payment", || {
                self.payments
                    .create_recurring_payment(&req.credit_card, &payment_id)
            })
            .await?;

        for subscription in &req.subscriptions {
            ctx.run(format!("add {}", subscription), || {
                self.subscriptions
                    .create_subscription(&req.user_id, subscription, &pay_ref)
            })
            .await?;
        }

        tracing::info!(user = %req.user_id, count = req.subscriptions.len(), "✅ Subscriptions created");
        Ok(())
    }
}

#[async_trait]
impl Service for SubscriptionService {
    fn name(&self) -> &'static str {
        "SubscriptionService"
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
