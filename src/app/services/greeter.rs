use crate::core::{
    decode_input, encode_output, unknown_handler, Context, HandlerDef, ObjectContext, Service,
    ServiceKind,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

const COUNT: &str = "count";

/// Keyed greeter that remembers how often each name was greeted.
pub struct GreeterObject;

impl GreeterObject {
    pub async fn greet(&self, ctx: ObjectContext, greeting: String) -> Result<String> {
        let count = ctx.get::<u64>(COUNT)?.unwrap_or(0) + 1;
        ctx.set(COUNT, &count)?;
        Ok(format!("{} {} for the {}-th time.", greeting, ctx.key(), count))
    }

    pub async fn ungreet(&self, ctx: ObjectContext) -> Result<String> {
        let count = ctx.get::<u64>(COUNT)?.unwrap_or(0).saturating_sub(1);
        ctx.set(COUNT, &count)?;
        Ok(format!("Dear {}, taking one greeting back: {}.", ctx.key(), count))
    }
}

#[async_trait]
impl Service for GreeterObject {
    fn name(&self) -> &'static str {
        "GreeterObject"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::VirtualObject
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[
            HandlerDef::exclusive("greet"),
            HandlerDef::exclusive("ungreet"),
        ];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "greet" => encode_output(self.greet(ctx.into_object()?, decode_input(input)?).await?),
            "ungreet" => encode_output(self.ungreet(ctx.into_object()?).await?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
