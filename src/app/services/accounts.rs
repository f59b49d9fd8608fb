use crate::core::{
    decode_input, encode_output, unknown_handler, Context, HandlerDef, ObjectContext, Service,
    ServiceKind, SharedObjectContext,
};
use crate::domain::model::Outcome;
use crate::utils::error::{DurableError, Result};
use crate::utils::validation::require_positive_amount;
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;

const BALANCE: &str = "balance";

/// Bank account holding a balance in cents; stands in for a real ledger.
#[derive(Debug, Clone, Default)]
pub struct Account {
    opening_balance: Option<i64>,
}

impl Account {
    pub fn new() -> Self {
        Self::default()
    }

    /// 固定的開戶金額，取代隨機金額（測試用）
    pub fn with_opening_balance(cents: i64) -> Self {
        Self {
            opening_balance: Some(cents),
        }
    }

    async fn current_balance(&self, ctx: &ObjectContext) -> Result<i64> {
        if let Some(balance) = ctx.get::<i64>(BALANCE)? {
            return Ok(balance);
        }

        let fixed = self.opening_balance;
        let balance = ctx
            .run("opening balance", move || async move {
                Ok::<_, DurableError>(
                    fixed.unwrap_or_else(|| rand::thread_rng().gen_range(100_000..200_000)),
                )
            })
            .await?;
        // 被拒絕的提款也要記住開戶金額
        ctx.set(BALANCE, &balance)?;
        Ok(balance)
    }

    pub async fn deposit(&self, ctx: ObjectContext, amount_cents: i64) -> Result<()> {
        require_positive_amount(amount_cents)?;

        let balance = self.current_balance(&ctx).await?;
        let updated = balance.checked_add(amount_cents).ok_or_else(|| {
            DurableError::terminal_with_code(
                400,
                format!("Deposit of {} cents would overflow the balance", amount_cents),
            )
        })?;
        ctx.set(BALANCE, &updated)?;
        Ok(())
    }

    pub async fn withdraw(&self, ctx: ObjectContext, amount_cents: i64) -> Result<Outcome> {
        require_positive_amount(amount_cents)?;

        let balance = self.current_balance(&ctx).await?;
        if balance < amount_cents {
            return Ok(Outcome::rejected(format!(
                "Insufficient funds: {} cents",
                balance
            )));
        }

        ctx.set(BALANCE, &(balance - amount_cents))?;
        Ok(Outcome::ok("Withdrawal successful"))
    }

    /// `None` until the first deposit or withdrawal draws the opening balance.
    pub async fn balance(&self, ctx: SharedObjectContext) -> Result<Option<i64>> {
        ctx.get::<i64>(BALANCE)
    }
}

#[async_trait]
impl Service for Account {
    fn name(&self) -> &'static str {
        "Account"
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::VirtualObject
    }

    fn handlers(&self) -> &'static [HandlerDef] {
        const HANDLERS: &[HandlerDef] = &[
            HandlerDef::exclusive("deposit"),
            HandlerDef::exclusive("withdraw"),
            HandlerDef::shared("balance"),
        ];
        HANDLERS
    }

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value> {
        match handler {
            "deposit" => encode_output(self.deposit(ctx.into_object()?, decode_input(input)?).await?),
            "withdraw" => {
                encode_output(self.withdraw(ctx.into_object()?, decode_input(input)?).await?)
            }
            "balance" => encode_output(self.balance(ctx.into_shared_object()?).await?),
            other => Err(unknown_handler(self.name(), other)),
        }
    }
}
