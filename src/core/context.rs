//! Context handed to every handler invocation.
//!
//! `Context` covers what every handler may do (side effects, timers,
//! awakeables, calls to other handlers). Keyed handlers convert it into
//! [`ObjectContext`] / [`WorkflowContext`] (or their shared variants) to
//! reach the state of their key.

use crate::core::promise::Completion;
use crate::core::runtime::{scope, LocalRuntime, Target};
use crate::utils::error::{DurableError, Result};
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::ops::Deref;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

pub struct Context {
    runtime: LocalRuntime,
    service: &'static str,
    handler: &'static str,
    key: Option<String>,
    invocation_id: String,
}

impl Context {
    pub(crate) fn new(
        runtime: LocalRuntime,
        service: &'static str,
        handler: &'static str,
        key: Option<String>,
        invocation_id: String,
    ) -> Self {
        Self {
            runtime,
            service,
            handler,
            key,
            invocation_id,
        }
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn service_name(&self) -> &str {
        self.service
    }

    pub fn handler_name(&self) -> &str {
        self.handler
    }

    pub fn rand_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }

    /// Runs a side effect, retrying retryable failures with the runtime's
    /// retry policy. Terminal failures are returned right away.
    pub async fn run<T, F, Fut>(&self, name: impl Into<String>, mut action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let name = name.into();
        let policy = self.runtime.retry_policy();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match action().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(action = %name, attempt, "Side effect succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && policy.should_retry(attempt) => {
                    let delay = policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        action = %name,
                        attempt,
                        "Side effect failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    tracing::error!(action = %name, attempt, "❌ Side effect gave up: {}", e);
                    return Err(DurableError::RetriesExhausted {
                        name,
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        tracing::debug!(?duration, "Sleeping");
        tokio::time::sleep(duration).await;
        Ok(())
    }

    pub fn awakeable<T: DeserializeOwned>(&self) -> (String, Awakeable<T>) {
        let (id, receiver) = self.runtime.register_awakeable();
        tracing::debug!(awakeable = %id, "Created awakeable");
        (
            id.clone(),
            Awakeable {
                id,
                receiver,
                runtime: self.runtime.clone(),
                _marker: PhantomData,
            },
        )
    }

    pub fn resolve_awakeable<T: Serialize>(&self, id: &str, value: &T) -> Result<()> {
        self.runtime
            .resolve_awakeable(id, serde_json::to_value(value)?)
    }

    pub fn reject_awakeable(&self, id: &str, reason: impl Into<String>) -> Result<()> {
        self.runtime.reject_awakeable(id, reason)
    }

    /// Request-response call to another handler
    pub async fn call<Req, Res>(&self, target: Target, request: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let input = serde_json::to_value(request)?;
        let output = self.runtime.invoke(target, input).await?;
        Ok(serde_json::from_value(output)?)
    }

    /// One-way call; returns the invocation id of the scheduled call
    pub fn send<Req>(&self, target: Target, request: &Req) -> Result<String>
    where
        Req: Serialize + ?Sized,
    {
        Ok(self
            .runtime
            .send(target, serde_json::to_value(request)?, None))
    }

    pub fn send_after<Req>(&self, target: Target, request: &Req, delay: Duration) -> Result<String>
    where
        Req: Serialize + ?Sized,
    {
        Ok(self
            .runtime
            .send(target, serde_json::to_value(request)?, Some(delay)))
    }

    fn keyed(self) -> Result<(Context, String, String)> {
        match self.key.clone() {
            Some(key) => {
                let scope = scope(self.service, &key);
                Ok((self, key, scope))
            }
            None => Err(DurableError::MissingKey {
                service: self.service.to_string(),
                handler: self.handler.to_string(),
            }),
        }
    }

    pub fn into_object(self) -> Result<ObjectContext> {
        let (ctx, key, scope) = self.keyed()?;
        Ok(ObjectContext { ctx, key, scope })
    }

    pub fn into_shared_object(self) -> Result<SharedObjectContext> {
        let (ctx, key, scope) = self.keyed()?;
        Ok(SharedObjectContext { ctx, key, scope })
    }

    pub fn into_workflow(self) -> Result<WorkflowContext> {
        Ok(WorkflowContext {
            object: self.into_object()?,
        })
    }

    pub fn into_shared_workflow(self) -> Result<SharedWorkflowContext> {
        Ok(SharedWorkflowContext {
            object: self.into_shared_object()?,
        })
    }
}

/// Future side of an awakeable. Await it to get the value passed to
/// `resolve_awakeable`; a rejection surfaces as a terminal error.
///
/// Dropping it unregisters the id, so a late completion is answered with
/// `AwakeableNotFound`.
pub struct Awakeable<T> {
    id: String,
    receiver: oneshot::Receiver<Completion>,
    runtime: LocalRuntime,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Drop for Awakeable<T> {
    fn drop(&mut self) {
        if self.runtime.cancel_awakeable(&self.id) {
            tracing::debug!(awakeable = %self.id, "Awakeable dropped before completion");
        }
    }
}

impl<T> Awakeable<T> {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl<T: DeserializeOwned + Send + 'static> IntoFuture for Awakeable<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(mut self) -> Self::IntoFuture {
        async move {
            let completion = (&mut self.receiver)
                .await
                .map_err(|_| DurableError::AwakeableDropped {
                    id: self.id.clone(),
                })?;
            let value = completion.map_err(|reason| DurableError::terminal(reason))?;
            Ok(serde_json::from_value(value)?)
        }
        .boxed()
    }
}

fn decode_state<T: DeserializeOwned>(runtime: &LocalRuntime, scope: &str, name: &str) -> Result<Option<T>> {
    runtime
        .get_state(scope, name)
        .map(serde_json::from_value)
        .transpose()
        .map_err(DurableError::from)
}

/// Exclusive access to the state of one virtual object key
pub struct ObjectContext {
    ctx: Context,
    key: String,
    scope: String,
}

impl Deref for ObjectContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

impl ObjectContext {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        decode_state(&self.ctx.runtime, &self.scope, name)
    }

    pub fn set<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        self.ctx
            .runtime
            .set_state(&self.scope, name, serde_json::to_value(value)?);
        Ok(())
    }

    pub fn clear(&self, name: &str) {
        self.ctx.runtime.clear_state(&self.scope, name);
    }

    pub fn clear_all(&self) {
        self.ctx.runtime.clear_all_state(&self.scope);
    }
}

/// Read-only access, may run concurrently with an exclusive handler
pub struct SharedObjectContext {
    ctx: Context,
    key: String,
    scope: String,
}

impl Deref for SharedObjectContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

impl SharedObjectContext {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        decode_state(&self.ctx.runtime, &self.scope, name)
    }
}

pub struct WorkflowContext {
    object: ObjectContext,
}

impl Deref for WorkflowContext {
    type Target = ObjectContext;

    fn deref(&self) -> &ObjectContext {
        &self.object
    }
}

impl WorkflowContext {
    /// 等待同一個 workflow key 上的具名 promise 被 resolve
    pub async fn promise<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let receiver = self
            .object
            .ctx
            .runtime
            .subscribe_promise(&self.object.scope, name);
        tracing::debug!(promise = name, "Waiting for durable promise");
        let completion = receiver.await.map_err(|_| DurableError::AwakeableDropped {
            id: name.to_string(),
        })?;
        let value = completion.map_err(|reason| DurableError::terminal(reason))?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn peek_promise<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        peek(&self.object.ctx.runtime, &self.object.scope, name)
    }
}

pub struct SharedWorkflowContext {
    object: SharedObjectContext,
}

impl Deref for SharedWorkflowContext {
    type Target = SharedObjectContext;

    fn deref(&self) -> &SharedObjectContext {
        &self.object
    }
}

impl SharedWorkflowContext {
    pub fn resolve_promise<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        self.object.ctx.runtime.complete_promise(
            &self.object.scope,
            name,
            Ok(serde_json::to_value(value)?),
        )
    }

    pub fn reject_promise(&self, name: &str, reason: impl Into<String>) -> Result<()> {
        self.object
            .ctx
            .runtime
            .complete_promise(&self.object.scope, name, Err(reason.into()))
    }

    pub fn peek_promise<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        peek(&self.object.ctx.runtime, &self.object.scope, name)
    }
}

fn peek<T: DeserializeOwned>(runtime: &LocalRuntime, scope: &str, name: &str) -> Result<Option<T>> {
    match runtime.peek_promise(scope, name) {
        Some(Ok(value)) => Ok(Some(serde_json::from_value(value)?)),
        Some(Err(reason)) => Err(DurableError::terminal(reason)),
        None => Ok(None),
    }
}
