//! Payment state machine keyed by payment id.
//!
//! A payment is executed at most once per id. A cancellation either blocks a
//! payment that has not arrived yet or refunds one that already went through.

use crate::core::{
    decode_input, encode_output, unknown_handler, Context, HandlerDef, ObjectContext, Service,
    ServiceKind, Target,
};
use crate::domain::model::{Outcome, Payment, PaymentStatus};
use crate::utils::error::{DurableError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const STATUS: &str = "status";
const PAYMENT: &str = "payment";

pub struct PaymentProcessor {
    expiry: Duration,
}

impl PaymentProcessor {
    pub fn new(expiry: Duration) -> Self {
        Self { expiry }
    }

    fn schedule_expiry(&self, ctx: &ObjectContext) -> Result<()> {
        ctx.send_after(
            Target::object("PaymentProcessor", ctx.key(), "expire"),
            &(),
            self.expiry,
        )?;
        Ok(())
    }

    pub async fn make_payment(&self, ctx: ObjectContext, payment: Payment) -> Result<Outcome> {
        let status: PaymentStatus = ctx.get(STATUS)?.unwrap_or_default();

        match status {
            PaymentStatus::Cancelled => return Ok(Outcome::rejected("Payment already cancelled")),
            PaymentStatus::CompletedSuccessfully => {
                return Ok(Outcome::rejected("Payment already completed in prior call"))
            }
            PaymentStatus::New => {}
        }

        let outcome: Outcome = ctx
            .call(
                Target::object("Account", &payment.account_id, "withdraw"),
                &payment.amount_cents,
            )
            .await?;

        // 只在扣款成功時記錄，失敗時呼叫端可以用同一個 id 重試
        if outcome.success {
            ctx.set(STATUS, &PaymentStatus::CompletedSuccessfully)?;
            ctx.set(PAYMENT, &payment)?;
            self.schedule_expiry(&ctx)?;
        }

        Ok(outcome)
    }

    pub async fn cancel_payment(&self, ctx: ObjectContext) -> Result<()> {
        let status: PaymentStatus = ctx.get(STATUS)?.unwrap_or_default();

        match status {
            PaymentStatus::New => {
                // 取消比付款先到：先記成已取消，之後的付款會被拒絕
                ctx.set(STATUS, &PaymentStatus::Cancelled)?;
                self.schedule_expiry(&ctx)?;
            }
            PaymentStatus::Cancelled => {}
            PaymentStatus::CompletedSuccessfully => {
                ctx.set(STATUS, &PaymentStatus::Cancelled)?;

                let payment: Payment = ctx.get(PAYMENT)?.ok_or_else(|| {
                    DurableError::terminal(format!("Payment {} has no recorded details", ctx.key()))
                })?;
                ctx.send(
                    Target::object("Account", &payment.account_id, "deposit"),
                    &payment.amount_cents,
                )?;
                tracing::info!(payment = ctx.key(), account = %payment.account_id, "Refund sent");
            }
        }

        Ok(())
    }

    pub async fn expire(&self, ctx: ObjectContext) -> Result<()> {
        ctx.clear_all();
        Ok(())
    }
}

#[async_trait]
impl Service for PaymentProcessor {
    fn name(&self) -> &'static str {
        "PaymentProcessor"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::VirtualObject
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[
            HandlerDef::exclusive("makePayment"),
            HandlerDef::exclusive("cancelPayment"),
            HandlerDef::exclusive("expire"),
        ];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "makePayment" => encode_output(
                self.make_payment(ctx.into_object()?, decode_input(input)?)
                    .await?,
            ),
            "cancelPayment" => encode_output(self.cancel_payment(ctx.into_object()?).await?),
            "expire" => encode_output(self.expire(ctx.into_object()?).await?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
