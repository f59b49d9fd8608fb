use crate::core::{
    decode_input, encode_output, unknown_handler, Context, HandlerDef, ObjectContext, Service,
    ServiceKind,
};
use crate::domain::model::{PostStatus, SocialMediaPost};
use crate::domain::ports::ContentModeration;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Posts of one user, processed in order. A post waiting for moderation
/// only holds back later posts of the same user.
pub struct UserFeed {
    moderation: Arc<dyn ContentModeration>,
    poll_interval: Duration,
}

impl UserFeed {
    pub fn new(moderation: Arc<dyn ContentModeration>, poll_interval: Duration) -> Self {
        Self {
            moderation,
            poll_interval,
        }
    }

    pub async fn process_post(&self, ctx: ObjectContext, post: SocialMediaPost) -> Result<()> {
        let user_id = ctx.key();
        let post_id = ctx
            .run("create post", || self.moderation.create_post(user_id, &post))
            .await?;

        loop {
            let status = ctx
                .run("post status", || self.moderation.get_post_status(&post_id))
                .await?;
            if status != PostStatus::Pending {
                tracing::info!(post = %post_id, ?status, "Moderation finished");
                break;
            }
            ctx.sleep(self.poll_interval).await?;
        }

        ctx.run("update feed", || {
            self.moderation.update_user_feed(user_id, &post_id)
        })
        .await
    }
}

#[async_trait]
impl Service for UserFeed {
    fn name(&self) -> &'static str {
        "UserFeed"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::VirtualObject
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[HandlerDef::exclusive("processPost")];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "processPost" => encode_output(
                self.process_post(ctx.into_object()?, decode_input(input)?)
                    .await?,
            ),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
