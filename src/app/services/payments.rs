//! Payments confirmed by an external provider through a webhook.
//!
//! `process` hands an awakeable id to the provider and waits until `confirm`
//! resolves it. `PaymentsWithTimeout` gives up after a deadline and cancels
//! the payment at the provider.

use crate::core::{decode_input, encode_output, unknown_handler, Context, HandlerDef, Service, ServiceKind};
use crate::domain::model::{ConfirmationRequest, PaymentRequest, PaymentResult};
use crate::domain::ports::PaymentGateway;
use crate::utils::error::Result;
use crate::utils::validation::require_positive_amount;
use async_trait::async_trait;
use serde_json::Value;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

fn confirm(ctx: &Context, confirmation: ConfirmationRequest) -> Result<()> {
    tracing::info!(awakeable = %confirmation.id, success = confirmation.result.success, "Payment confirmation received");
    ctx.resolve_awakeable(&confirmation.id, &confirmation.result)
}

pub struct Payments {
    payments: Arc<dyn PaymentGateway>,
}

impl Payments {
    pub fn new(payments: Arc<dyn PaymentGateway>) -> Self {
        Self { payments }
    }

    pub async fn process(&self, ctx: &Context, req: PaymentRequest) -> Result<PaymentResult> {
        require_positive_amount(req.amount)?;

        let (confirmation_id, confirmation) = ctx.awakeable::<PaymentResult>();
        ctx.run("pay", || self.payments.init_payment(&req, &confirmation_id))
            .await?;

        // 等外部付款系統呼叫 confirm
        confirmation.await
    }
}

#[async_trait]
impl Service for Payments {
    fn name(&self) -> &'static str {
        "Payments"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Service
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[HandlerDef::new("process"), HandlerDef::new("confirm")];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "process" => encode_output(self.process(&ctx, decode_input(input)?).await?),
            "confirm" => encode_output(confirm(&ctx, decode_input(input)?)?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}

pub struct PaymentsWithTimeout {
    payments: Arc<dyn PaymentGateway>,
    timeout: Duration,
}

impl PaymentsWithTimeout {
    pub fn new(payments: Arc<dyn PaymentGateway>, timeout: Duration) -> Self {
        Self { payments, timeout }
    }

    pub async fn process(&self, ctx: &Context, req: PaymentRequest) -> Result<PaymentResult> {
        require_positive_amount(req.amount)?;

        let (confirmation_id, confirmation) = ctx.awakeable::<PaymentResult>();
        let pay_ref = ctx
            .run("pay", || self.payments.init_payment(&req, &confirmation_id))
            .await?;

        tokio::select! {
            result = confirmation.into_future() => result,
            _ = ctx.sleep(self.timeout) => {
                tracing::warn!(payment = %pay_ref, "⏰ Payment not confirmed within {:?}", self.timeout);
                ctx.run("cancel-payment", || self.payments.cancel_payment(&pay_ref))
                    .await?;
                Ok(PaymentResult::timed_out())
            }
        }
    }
}

#[async_trait]
impl Service for PaymentsWithTimeout {
    fn name(&self) -> &'static str {
        "PaymentsWithTimeout"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Service
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[HandlerDef::new("process"), HandlerDef::new("confirm")];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "process" => encode_output(self.process(&ctx, decode_input(input)?).await?),
            "confirm" => encode_output(confirm(&ctx, decode_input(input)?)?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
