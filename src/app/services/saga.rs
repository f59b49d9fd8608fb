use crate::core::{
    decode_input, encode_output, unknown_handler, Compensations, Context, HandlerDef, Service,
    ServiceKind,
};
use crate::domain::model::SubscriptionRequest;
use crate::domain::ports::{PaymentGateway, SubscriptionApi};
use crate::utils::error::Result;
use crate::utils::validation::require_non_empty;
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;

/// Subscription flow that undoes every completed step when one of them
/// fails for good.
pub struct SubscriptionSaga {
    payments: Arc<dyn PaymentGateway>,
    subscriptions: Arc<dyn SubscriptionApi>,
}

impl SubscriptionSaga {
    pub fn new(payments: Arc<dyn PaymentGateway>, subscriptions: Arc<dyn SubscriptionApi>) -> Self {
        Self {
            payments,
            subscriptions,
        }
    }

    pub async fn add(&self, ctx: &Context, req: SubscriptionRequest) -> Result<()> {
        require_non_empty("userId", &req.user_id)?;

        let mut compensations = Compensations::new();
        let outcome = self.subscribe(ctx, &req, &mut compensations).await;
        match outcome {
            Ok(()) => Ok(()),
            // 暫時性錯誤會被重試，不需要補償
            Err(e) if e.is_retryable() => Err(e),
            Err(e) => {
                tracing::error!(user = %req.user_id, "❌ Subscription failed, compensating: {}", e);
                compensations.compensate(ctx).await?;
                Err(e)
            }
        }
    }

    async fn subscribe(
        &self,
        ctx: &Context,
        req: &SubscriptionRequest,
        compensations: &mut Compensations,
    ) -> Result<()> {
        let payment_id = ctx.rand_uuid().to_string();

        // 先登記補償再執行步驟，失敗到一半的步驟也會被撤銷
        let payments = self.payments.clone();
        let id = payment_id.clone();
        compensations.push(format!("undo payment {}", payment_id), move || {
            let payments = payments.clone();
            let id = id.clone();
            async move { payments.remove_recurring_payment(&id).await }.boxed()
        });
        let pay_ref = ctx
            .run("pay", || {
                self.payments
                    .create_recurring_payment(&req.credit_card, &payment_id)
            })
            .await?;

        for subscription in &req.subscriptions {
            let api = self.subscriptions.clone();
            let user_id = req.user_id.clone();
            let name = subscription.clone();
            compensations.push(format!("undo {}", subscription), move || {
                let api = api.clone();
                let user_id = user_id.clone();
                let name = name.clone();
                async move { api.remove_subscription(&user_id, &name).await }.boxed()
            });

            ctx.run(format!("add-{}", subscription), || {
                self.subscriptions
                    .create_subscription(&req.user_id, subscription, &pay_ref)
            })
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Service for SubscriptionSaga {
    fn name(&self) -> &'static str {
        "SubscriptionSaga"
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
