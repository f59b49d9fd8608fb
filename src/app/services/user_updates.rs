use crate::core::{
    decode_input, encode_output, unknown_handler, Context, HandlerDef, ObjectContext, Service,
    ServiceKind,
};
use crate::domain::model::UserUpdate;
use crate::domain::ports::UserDirectory;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const NOT_READY: &str = "NOT_READY";

/// Applies user update events in order per user, backing off while the
/// profile system is not ready.
pub struct UserUpdatesService {
    users: Arc<dyn UserDirectory>,
    retry_interval: Duration,
}

impl UserUpdatesService {
    pub fn new(users: Arc<dyn UserDirectory>, retry_interval: Duration) -> Self {
        Self {
            users,
            retry_interval,
        }
    }

    pub async fn update_user_event(&self, ctx: ObjectContext, update: UserUpdate) -> Result<()> {
        let mut user_id = ctx
            .run("update profile", || self.users.update_user_profile(&update.profile))
            .await?;

        while user_id == NOT_READY {
            // 只會延後同一個 key 的事件，其他使用者照常處理
            ctx.sleep(self.retry_interval).await?;
            user_id = ctx
                .run("update profile", || self.users.update_user_profile(&update.profile))
                .await?;
        }

        let role_id = ctx
            .run("set permissions", || {
                self.users.set_user_permissions(&user_id, &update.permissions)
            })
            .await?;
        ctx.run("provision resources", || {
            self.users
                .provision_resources(&user_id, &role_id, &update.resources)
        })
        .await?;

        tracing::info!(user = %user_id, role = %role_id, "User update applied");
        Ok(())
    }
}

#[async_trait]
impl Service for UserUpdatesService {
    fn name(&self) -> &'static str {
        "UserUpdatesService"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::VirtualObject
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[HandlerDef::exclusive("updateUserEvent")];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "updateUserEvent" => encode_output(
                self.update_user_event(ctx.into_object()?, decode_input(input)?)
                    .await?,
            ),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
