//! In-memory runtime used to serve and test the examples locally.
//!
//! State, awakeables and promises live in process memory only. Nothing is
//! journaled or persisted; restarting the process starts from scratch.

use crate::core::context::Context;
use crate::core::endpoint::{Endpoint, HandlerDef, HandlerKind, Service, ServiceKind};
use crate::core::promise::{Completion, PromiseSlot};
use crate::core::retry::RetryPolicy;
use crate::utils::error::{DurableError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Address of a handler: `Service/handler` or `Object/key/handler`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    pub service: String,
    pub key: Option<String>,
    pub handler: String,
}

impl Target {
    pub fn service(service: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            key: None,
            handler: handler.into(),
        }
    }

    pub fn object(
        service: impl Into<String>,
        key: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            key: Some(key.into()),
            handler: handler.into(),
        }
    }

    pub fn workflow(
        service: impl Into<String>,
        key: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        Self::object(service, key, handler)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}/{}/{}", self.service, key, self.handler),
            None => write!(f, "{}/{}", self.service, self.handler),
        }
    }
}

pub(crate) fn scope(service: &str, key: &str) -> String {
    format!("{}/{}", service, key)
}

/// 冪等鍵的結果保留多久
pub const IDEMPOTENCY_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

fn new_invocation_id() -> String {
    format!("inv_{}", Uuid::new_v4().simple())
}

fn completion_into_result(completion: Completion) -> Result<Value> {
    completion.map_err(|reason| DurableError::terminal(reason))
}

struct RuntimeInner {
    endpoint: Endpoint,
    retry_policy: RetryPolicy,
    state: DashMap<String, HashMap<String, Value>>,
    object_locks: DashMap<String, Arc<Mutex<()>>>,
    awakeables: DashMap<String, oneshot::Sender<Completion>>,
    promises: DashMap<String, PromiseSlot>,
    workflows: DashMap<String, PromiseSlot>,
    idempotent_results: DashMap<String, (Value, Instant)>,
}

/// Exclusive access to one object/workflow key. The lock entry is removed
/// on release once nobody else holds or waits for it.
struct ObjectLease {
    inner: Arc<RuntimeInner>,
    scope: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ObjectLease {
    fn drop(&mut self) {
        self.guard.take();
        self.inner
            .object_locks
            .remove_if(&self.scope, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Clone)]
pub struct LocalRuntime {
    inner: Arc<RuntimeInner>,
}

impl LocalRuntime {
    pub fn new(endpoint: Endpoint, retry_policy: RetryPolicy) -> Self {
        tracing::info!(
            services = endpoint.len(),
            max_attempts = retry_policy.max_attempts,
            "Local runtime ready"
        );
        Self {
            inner: Arc::new(RuntimeInner {
                endpoint,
                retry_policy,
                state: DashMap::new(),
                object_locks: DashMap::new(),
                awakeables: DashMap::new(),
                promises: DashMap::new(),
                workflows: DashMap::new(),
                idempotent_results: DashMap::new(),
            }),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry_policy
    }

    /// Request-response invocation
    pub fn invoke(&self, target: Target, input: Value) -> BoxFuture<'static, Result<Value>> {
        self.invoke_with_id(target, input, new_invocation_id())
    }

    /// Like [`invoke`](Self::invoke), but a repeated idempotency key for the same
    /// target returns the first result without running the handler again.
    /// Results are kept for [`IDEMPOTENCY_RETENTION`].
    pub async fn invoke_idempotent(
        &self,
        target: Target,
        input: Value,
        idempotency_key: &str,
    ) -> Result<Value> {
        let now = Instant::now();
        self.inner
            .idempotent_results
            .retain(|_, (_, stored_at)| now.duration_since(*stored_at) < IDEMPOTENCY_RETENTION);

        let cache_key = format!("{}#{}", target, idempotency_key);
        if let Some(cached) = self.inner.idempotent_results.get(&cache_key) {
            tracing::debug!(idempotency_key, "Returning result of earlier invocation");
            return Ok(cached.value().0.clone());
        }

        let output = self.invoke(target, input).await?;
        self.inner
            .idempotent_results
            .insert(cache_key, (output.clone(), Instant::now()));
        Ok(output)
    }

    /// One-way invocation, optionally delayed. Returns the invocation id.
    pub fn send(&self, target: Target, input: Value, delay: Option<Duration>) -> String {
        let invocation_id = new_invocation_id();
        let runtime = self.clone();
        let id = invocation_id.clone();

        tracing::debug!(invocation_id = %id, target = %target, ?delay, "Scheduling one-way invocation");
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let label = target.to_string();
            if let Err(e) = runtime.invoke_with_id(target, input, id.clone()).await {
                tracing::warn!(invocation_id = %id, "One-way invocation {} failed: {}", label, e);
            }
        });

        invocation_id
    }

    fn invoke_with_id(
        &self,
        target: Target,
        input: Value,
        invocation_id: String,
    ) -> BoxFuture<'static, Result<Value>> {
        let runtime = self.clone();
        async move {
            let span = tracing::info_span!(
                "invoke",
                target = %target,
                invocation_id = %invocation_id
            );
            runtime.dispatch(target, input, invocation_id).instrument(span).await
        }
        .boxed()
    }

    /// Checks that `target` can be invoked: the handler exists and keyed
    /// services get a key.
    pub fn validate_target(&self, target: &Target) -> Result<()> {
        self.resolve_target(target).map(|_| ())
    }

    fn resolve_target(&self, target: &Target) -> Result<(Arc<dyn Service>, HandlerDef)> {
        let service = self.inner.endpoint.service(&target.service)?;
        let handler = service.handler(&target.handler)?;
        if service.kind() != ServiceKind::Service && target.key.is_none() {
            return Err(DurableError::MissingKey {
                service: target.service.clone(),
                handler: target.handler.clone(),
            });
        }
        Ok((service, handler))
    }

    async fn dispatch(&self, target: Target, input: Value, invocation_id: String) -> Result<Value> {
        let (service, handler) = self.resolve_target(&target)?;
        tracing::debug!("Invoking handler");

        if service.kind() == ServiceKind::Service {
            let ctx = Context::new(self.clone(), service.name(), handler.name, None, invocation_id);
            return service.invoke(ctx, handler.name, input).await;
        }

        let key = target.key.ok_or_else(|| DurableError::MissingKey {
            service: target.service.clone(),
            handler: target.handler.clone(),
        })?;
        let ctx = Context::new(
            self.clone(),
            service.name(),
            handler.name,
            Some(key.clone()),
            invocation_id,
        );

        match handler.kind.unwrap_or(HandlerKind::Exclusive) {
            HandlerKind::Shared => service.invoke(ctx, handler.name, input).await,
            HandlerKind::Exclusive => {
                let _lease = self.lock_object(service.name(), &key).await;
                service.invoke(ctx, handler.name, input).await
            }
            HandlerKind::Workflow => {
                self.run_workflow(service, handler.name, key, ctx, input)
                    .await
            }
        }
    }

    /// Starts the workflow body in its own task. Dropping the caller only
    /// stops waiting; the run still completes and `attach` sees its result.
    async fn run_workflow(
        &self,
        service: Arc<dyn Service>,
        handler: &'static str,
        key: String,
        ctx: Context,
        input: Value,
    ) -> Result<Value> {
        let workflow_scope = scope(service.name(), &key);
        match self.inner.workflows.entry(workflow_scope.clone()) {
            Entry::Occupied(_) => {
                return Err(DurableError::WorkflowAlreadyStarted {
                    service: service.name().to_string(),
                    key,
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(PromiseSlot::default());
            }
        }

        let runtime = self.clone();
        let run = async move {
            let result = {
                let _lease = runtime.lock_object(service.name(), &key).await;
                AssertUnwindSafe(service.invoke(ctx, handler, input))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(DurableError::terminal("Workflow handler panicked")))
            };

            let completion: Completion = match &result {
                Ok(value) => Ok(value.clone()),
                Err(e) => Err(e.to_string()),
            };
            if let Some(mut slot) = runtime.inner.workflows.get_mut(&workflow_scope) {
                slot.complete(completion);
            }
            tracing::info!(workflow = %workflow_scope, success = result.is_ok(), "Workflow finished");
            result
        };

        tokio::spawn(run.in_current_span())
            .await
            .map_err(|e| DurableError::terminal(format!("Workflow task failed: {}", e)))?
    }

    /// Waits for the result of a workflow run
    pub async fn attach_workflow(&self, service: &str, key: &str) -> Result<Value> {
        let not_found = || DurableError::WorkflowNotFound {
            service: service.to_string(),
            key: key.to_string(),
        };
        let receiver = match self.inner.workflows.get_mut(&scope(service, key)) {
            Some(mut slot) => slot.subscribe(),
            None => return Err(not_found()),
        };
        let completion = receiver.await.map_err(|_| not_found())?;
        completion_into_result(completion)
    }

    /// Result of a workflow run without waiting for it
    pub fn workflow_output(&self, service: &str, key: &str) -> Result<Value> {
        let completion = match self.inner.workflows.get(&scope(service, key)) {
            Some(slot) => slot.peek().cloned(),
            None => {
                return Err(DurableError::WorkflowNotFound {
                    service: service.to_string(),
                    key: key.to_string(),
                })
            }
        };
        match completion {
            Some(completion) => completion_into_result(completion),
            None => Err(DurableError::WorkflowNotCompleted {
                service: service.to_string(),
                key: key.to_string(),
            }),
        }
    }

    pub(crate) fn register_awakeable(&self) -> (String, oneshot::Receiver<Completion>) {
        let id = format!("awk_{}", Uuid::new_v4().simple());
        let (tx, rx) = oneshot::channel();
        self.inner.awakeables.insert(id.clone(), tx);
        (id, rx)
    }

    pub fn resolve_awakeable(&self, id: &str, value: Value) -> Result<()> {
        self.complete_awakeable(id, Ok(value))
    }

    pub fn reject_awakeable(&self, id: &str, reason: impl Into<String>) -> Result<()> {
        self.complete_awakeable(id, Err(reason.into()))
    }

    /// 等待端放棄時註銷；之後的 resolve 會得到 404
    pub(crate) fn cancel_awakeable(&self, id: &str) -> bool {
        self.inner.awakeables.remove(id).is_some()
    }

    fn complete_awakeable(&self, id: &str, completion: Completion) -> Result<()> {
        let (_, sender) =
            self.inner
                .awakeables
                .remove(id)
                .ok_or_else(|| DurableError::AwakeableNotFound { id: id.to_string() })?;
        if sender.send(completion).is_err() {
            tracing::warn!(awakeable = %id, "Awakeable completed, but nobody is waiting for it anymore");
        }
        Ok(())
    }

    pub(crate) fn subscribe_promise(
        &self,
        scope: &str,
        name: &str,
    ) -> oneshot::Receiver<Completion> {
        self.inner
            .promises
            .entry(format!("{}#{}", scope, name))
            .or_default()
            .subscribe()
    }

    pub(crate) fn complete_promise(
        &self,
        scope: &str,
        name: &str,
        completion: Completion,
    ) -> Result<()> {
        let completed = self
            .inner
            .promises
            .entry(format!("{}#{}", scope, name))
            .or_default()
            .complete(completion);
        if completed {
            Ok(())
        } else {
            Err(DurableError::PromiseAlreadyCompleted {
                name: name.to_string(),
            })
        }
    }

    pub(crate) fn peek_promise(&self, scope: &str, name: &str) -> Option<Completion> {
        self.inner
            .promises
            .get(&format!("{}#{}", scope, name))
            .and_then(|slot| slot.peek().cloned())
    }

    pub(crate) fn get_state(&self, scope: &str, name: &str) -> Option<Value> {
        self.inner
            .state
            .get(scope)
            .and_then(|entries| entries.get(name).cloned())
    }

    pub(crate) fn set_state(&self, scope: &str, name: &str, value: Value) {
        self.inner
            .state
            .entry(scope.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    pub(crate) fn clear_state(&self, scope: &str, name: &str) {
        if let Some(mut entries) = self.inner.state.get_mut(scope) {
            entries.remove(name);
        }
    }

    pub(crate) fn clear_all_state(&self, scope: &str) {
        self.inner.state.remove(scope);
    }

    /// Copy of the state of one object/workflow instance
    pub fn state_snapshot(&self, service: &str, key: &str) -> HashMap<String, Value> {
        self.inner
            .state
            .get(&scope(service, key))
            .map(|entries| entries.value().clone())
            .unwrap_or_default()
    }

    async fn lock_object(&self, service: &str, key: &str) -> ObjectLease {
        let mut lease = ObjectLease {
            inner: self.inner.clone(),
            scope: scope(service, key),
            guard: None,
        };
        let lock = self
            .inner
            .object_locks
            .entry(lease.scope.clone())
            .or_default()
            .value()
            .clone();
        lease.guard = Some(lock.lock_owned().await);
        lease
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.inner.object_locks.len()
    }

    #[cfg(test)]
    fn pending_awakeables(&self) -> usize {
        self.inner.awakeables.len()
    }
}
