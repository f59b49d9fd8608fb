use crate::core::{
    decode_input, encode_output, unknown_handler, Context, HandlerDef, ObjectContext, Service,
    ServiceKind, Target,
};
use crate::domain::model::CheckoutRequest;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

const TICKETS: &str = "tickets";

/// Shopping cart per user. Reserved tickets are released again when the
/// reservation expires before checkout.
pub struct CartObject {
    reservation_ttl: Duration,
}

impl CartObject {
    pub fn new(reservation_ttl: Duration) -> Self {
        Self { reservation_ttl }
    }

    pub async fn add_ticket(&self, ctx: ObjectContext, ticket_id: String) -> Result<bool> {
        let reserved: bool = ctx
            .call(Target::object("TicketObject", &ticket_id, "reserve"), &())
            .await?;

        if reserved {
            let mut tickets: BTreeSet<String> = ctx.get(TICKETS)?.unwrap_or_default();
            tickets.insert(ticket_id.clone());
            ctx.set(TICKETS, &tickets)?;

            ctx.send_after(
                Target::object("CartObject", ctx.key(), "expireTicket"),
                &ticket_id,
                self.reservation_ttl,
            )?;
        }

        Ok(reserved)
    }

    pub async fn checkout(&self, ctx: ObjectContext) -> Result<bool> {
        let tickets: BTreeSet<String> = ctx.get(TICKETS)?.unwrap_or_default();
        if tickets.is_empty() {
            return Ok(false);
        }

        let request = CheckoutRequest {
            user_id: ctx.key().to_string(),
            tickets: tickets.clone(),
        };
        let success: bool = ctx
            .call(Target::service("CheckoutService", "handle"), &request)
            .await?;

        if success {
            for ticket_id in &tickets {
                ctx.send(Target::object("TicketObject", ticket_id, "markAsSold"), &())?;
            }
            ctx.clear(TICKETS);
        }

        Ok(success)
    }

    pub async fn expire_ticket(&self, ctx: ObjectContext, ticket_id: String) -> Result<()> {
        let mut tickets: BTreeSet<String> = ctx.get(TICKETS)?.unwrap_or_default();

        if tickets.remove(&ticket_id) {
            ctx.set(TICKETS, &tickets)?;
            ctx.send(Target::object("TicketObject", &ticket_id, "unreserve"), &())?;
            tracing::info!(user = ctx.key(), ticket = %ticket_id, "Reservation expired");
        }

        Ok(())
    }
}

#[async_trait]
impl Service for CartObject {
    fn name(&self) -> &'static str {
        "CartObject"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::VirtualObject
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[
            HandlerDef::exclusive("addTicket"),
            HandlerDef::exclusive("checkout"),
            HandlerDef::exclusive("expireTicket"),
        ];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "addTicket" => {
                encode_output(self.add_ticket(ctx.into_object()?, decode_input(input)?).await?)
            }
            "checkout" => encode_output(self.checkout(ctx.into_object()?).await?),
            "expireTicket" => encode_output(
                self.expire_ticket(ctx.into_object()?, decode_input(input)?)
                    .await?,
            ),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
