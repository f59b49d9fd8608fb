use crate::core::{unknown_handler, Context, HandlerDef, ObjectContext, Service, ServiceKind};
use crate::domain::model::TicketStatus;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

const STATUS: &str = "status";

pub struct TicketObject;

impl TicketObject {
    fn status(ctx: &ObjectContext) -> Result<TicketStatus> {
        Ok(ctx.get(STATUS)?.unwrap_or_default())
    }

    pub async fn reserve(&self, ctx: ObjectContext) -> Result<bool> {
        if Self::status(&ctx)? == TicketStatus::Available {
            ctx.set(STATUS, &TicketStatus::Reserved)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn unreserve(&self, ctx: ObjectContext) -> Result<()> {
        if Self::status(&ctx)? != TicketStatus::Sold {
            ctx.clear(STATUS);
        }
        Ok(())
    }

    pub async fn mark_as_sold(&self, ctx: ObjectContext) -> Result<()> {
        if Self::status(&ctx)? == TicketStatus::Reserved {
            ctx.set(STATUS, &TicketStatus::Sold)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Service for TicketObject {
    fn name(&self) -> &'static str {
        "TicketObject"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::VirtualObject
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[
            HandlerDef::exclusive("reserve"),
            HandlerDef::exclusive("unreserve"),
            HandlerDef::exclusive("markAsSold"),
        ];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, _input: Value) -> Result<Value> {
        match handler {
            "reserve" => Ok(Value::Bool(self.reserve(ctx.into_object()?).await?)),
            "unreserve" => {
                self.unreserve(ctx.into_object()?).await?;
                Ok(Value::Null)
            }
            "markAsSold" => {
                self.mark_as_sold(ctx.into_object()?).await?;
                Ok(Value::Null)
            }
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
