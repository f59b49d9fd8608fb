use crate::core::{decode_input, encode_output, unknown_handler, Context, HandlerDef, Service, ServiceKind};
use crate::domain::model::CheckoutRequest;
use crate::domain::ports::{EmailClient, PaymentGateway};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const TICKET_PRICE: f64 = 40.0;

pub struct CheckoutService {
    payments: Arc<dyn PaymentGateway>,
    email: Arc<dyn EmailClient>,
}

impl CheckoutService {
    pub fn new(payments: Arc<dyn PaymentGateway>, email: Arc<dyn EmailClient>) -> Self {
        Self { payments, email }
    }

    pub async fn handle(&self, ctx: &Context, req: CheckoutRequest) -> Result<bool> {
        let idempotency_key = ctx.rand_uuid().to_string();
        let total_price = req.tickets.len() as f64 * TICKET_PRICE;

        let success = ctx
            .run("charge", || self.payments.charge(&idempotency_key, total_price))
            .await?;

        if success {
            ctx.run("notify success", || {
                self.email.notify_payment_success(&req.user_id)
            })
            .await?;
        } else {
            ctx.run("notify failure", || {
                self.email.notify_payment_failure(&req.user_id)
            })
            .await?;
        }

        tracing::info!(user = %req.user_id, total_price, success, "Checkout finished");
        Ok(success)
    }
}

#[async_trait]
impl Service for CheckoutService {
    fn name(&self) -> &'static str {
        "CheckoutService"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Service
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[HandlerDef::new("handle")];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "handle" => encode_output(self.handle(&ctx, decode_input(input)?).await?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
