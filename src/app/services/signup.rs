use crate::core::{
    decode_input, encode_output, unknown_handler, Context, HandlerDef, Service, ServiceKind,
    SharedWorkflowContext, WorkflowContext,
};
use crate::domain::model::User;
use crate::domain::ports::{EmailClient, UserDirectory};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const EMAIL_LINK: &str = "email-link";

/// Sign-up flow keyed by user id; `run` happens once per user.
pub struct SignupWorkflow {
    users: Arc<dyn UserDirectory>,
    email: Arc<dyn EmailClient>,
}

impl SignupWorkflow {
    pub fn new(users: Arc<dyn UserDirectory>, email: Arc<dyn EmailClient>) -> Self {
        Self { users, email }
    }

    pub async fn run(&self, ctx: WorkflowContext, user: User) -> Result<bool> {
        ctx.run("create user entry", || self.users.create_user_entry(&user))
            .await?;

        let secret = ctx.rand_uuid().to_string();
        let user_id = ctx.key();
        ctx.run("send email", || {
            self.email.send_email_with_link(user_id, &user, &secret)
        })
        .await?;

        // 等使用者點擊信中的連結
        let click_secret: String = ctx.promise(EMAIL_LINK).await?;
        let verified = click_secret == secret;
        tracing::info!(user = user_id, verified, "Sign-up finished");
        Ok(verified)
    }

    pub async fn click(&self, ctx: SharedWorkflowContext, secret: String) -> Result<()> {
        ctx.resolve_promise(EMAIL_LINK, &secret)
    }
}

#[async_trait]
impl Service for SignupWorkflow {
    fn name(&self) -> &'static str {
        "SignupWorkflow"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Workflow
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[
            HandlerDef::workflow("run"),
            HandlerDef::shared("click"),
        ];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "run" => encode_output(self.run(ctx.into_workflow()?, decode_input(input)?).await?),
            "click" => encode_output(
                self.click(ctx.into_shared_workflow()?, decode_input(input)?)
                    .await?,
            ),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
