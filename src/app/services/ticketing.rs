//! Service communication: request-response, one-way and delayed calls.

use crate::core::{decode_input, encode_output, unknown_handler, Context, HandlerDef, Service, ServiceKind, Target};
use crate::domain::model::PurchaseTicketRequest;
use crate::domain::ports::{EmailClient, PaymentGateway};
use crate::utils::error::{DurableError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Delay until one day before the concert, zero if that moment already passed.
pub fn day_before(concert_date_time: &str, now: DateTime<Utc>) -> Result<Duration> {
    let concert = DateTime::parse_from_rfc3339(concert_date_time).map_err(|e| {
        DurableError::terminal_with_code(
            400,
            format!("Invalid concert date '{}': {}", concert_date_time, e),
        )
    })?;
    let reminder_at = concert.with_timezone(&Utc) - chrono::Duration::days(1);
    Ok((reminder_at - now).to_std().unwrap_or(Duration::ZERO))
}

pub struct ConcertTicketingService;

impl ConcertTicketingService {
    pub async fn buy(&self, ctx: &Context, req: PurchaseTicketRequest) -> Result<String> {
        let now = ctx
            .run("now", || async { Ok::<_, DurableError>(Utc::now()) })
            .await?;
        let reminder_delay = day_before(&req.concert_date_time, now)?;

        // 同步呼叫：等付款完成
        let pay_ref: String = ctx
            .call(Target::service("PaymentService", "charge"), &req)
            .await?;

        // 單向訊息：寄送票券
        ctx.send(Target::service("EmailService", "emailTicket"), &req)?;

        // 延遲訊息：演唱會前一天提醒
        ctx.send_after(
            Target::service("EmailService", "sendReminder"),
            &req,
            reminder_delay,
        )?;

        Ok(format!(
            "Ticket purchased successfully with payment reference: {}",
            pay_ref
        ))
    }
}

#[async_trait]
impl Service for ConcertTicketingService {
    fn name(&self) -> &'static str {
        "ConcertTicketingService"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Service
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[HandlerDef::new("buy")];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "buy" => encode_output(self.buy(&ctx, decode_input(input)?).await?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}

pub struct PaymentService {
    payments: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(payments: Arc<dyn PaymentGateway>) -> Self {
        Self { payments }
    }

    pub async fn charge(&self, ctx: &Context, req: PurchaseTicketRequest) -> Result<String> {
        let payment_id = ctx.rand_uuid().to_string();
        tracing::info!(
            "Processing payment for ticket {} with payment ID {}",
            req.ticket_id,
            payment_id
        );

        let charged = ctx
            .run("charge", || self.payments.charge(&payment_id, req.price))
            .await?;
        if !charged {
            return Err(DurableError::terminal_with_code(
                402,
                format!("Payment declined for ticket {}", req.ticket_id),
            ));
        }

        Ok(payment_id)
    }
}

#[async_trait]
impl Service for PaymentService {
    fn name(&self) -> &'static str {
        "PaymentService"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Service
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[HandlerDef::new("charge")];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "charge" => encode_output(self.charge(&ctx, decode_input(input)?).await?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}

pub struct EmailService {
    email: Arc<dyn EmailClient>,
}

impl EmailService {
    pub fn new(email: Arc<dyn EmailClient>) -> Self {
        Self { email }
    }

    pub async fn email_ticket(&self, ctx: &Context, req: PurchaseTicketRequest) -> Result<()> {
        ctx.run("email ticket", || self.email.email_ticket(&req))
            .await
    }

    pub async fn send_reminder(&self, ctx: &Context, req: PurchaseTicketRequest) -> Result<()> {
        ctx.run("send reminder", || self.email.send_reminder(&req))
            .await
    }
}

#[async_trait]
impl Service for EmailService {
    fn name(&self) -> &'static str {
        "EmailService"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Service
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[
            HandlerDef::new("emailTicket"),
            HandlerDef::new("sendReminder"),
        ];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "emailTicket" => encode_output(self.email_ticket(&ctx, decode_input(input)?).await?),
            "sendReminder" => {
                encode_output(self.send_reminder(&ctx, decode_input(input)?).await?)
            }
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
