use crate::core::context::Context;
use crate::utils::error::{DurableError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceKind {
    Service,
    VirtualObject,
    Workflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandlerKind {
    /// 同一個 key 一次只執行一個
    Exclusive,
    /// 只讀取狀態，可與其他 handler 併發
    Shared,
    /// workflow 的主流程，每個 key 只執行一次
    Workflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HandlerDef {
    pub name: &'static str,
    #[serde(rename = "ty", skip_serializing_if = "Option::is_none")]
    pub kind: Option<HandlerKind>,
}

impl HandlerDef {
    /// Handler of a plain (unkeyed) service
    pub const fn new(name: &'static str) -> Self {
        Self { name, kind: None }
    }

    pub const fn exclusive(name: &'static str) -> Self {
        Self {
            name,
            kind: Some(HandlerKind::Exclusive),
        }
    }

    pub const fn shared(name: &'static str) -> Self {
        Self {
            name,
            kind: Some(HandlerKind::Shared),
        }
    }

    pub const fn workflow(name: &'static str) -> Self {
        Self {
            name,
            kind: Some(HandlerKind::Workflow),
        }
    }
}

/// An example bound into the endpoint: a named set of handlers.
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> ServiceKind;
    fn handlers(&self) -> &'static [HandlerDef];

    async fn invoke(&self, ctx: Context, handler: &str, input: Value) -> Result<Value>;

    fn handler(&self, name: &str) -> Result<HandlerDef> {
        self.handlers()
            .iter()
            .find(|h| h.name == name)
            .copied()
            .ok_or_else(|| DurableError::HandlerNotFound {
                service: self.name().to_string(),
                handler: name.to_string(),
            })
    }
}

pub fn decode_input<T: DeserializeOwned>(input: Value) -> Result<T> {
    Ok(serde_json::from_value(input)?)
}

pub fn encode_output<T: Serialize>(output: T) -> Result<Value> {
    Ok(serde_json::to_value(output)?)
}

pub fn unknown_handler(service: &str, handler: &str) -> DurableError {
    DurableError::HandlerNotFound {
        service: service.to_string(),
        handler: handler.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceManifest {
    pub name: &'static str,
    pub ty: ServiceKind,
    pub handlers: Vec<HandlerDef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointManifest {
    pub services: Vec<ServiceManifest>,
}

/// The set of services served together, e.g. behind one HTTP listener.
#[derive(Clone, Default)]
pub struct Endpoint {
    services: HashMap<String, Arc<dyn Service>>,
}

impl Endpoint {
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::default()
    }

    pub fn service(&self, name: &str) -> Result<Arc<dyn Service>> {
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| DurableError::ServiceNotFound {
                service: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn manifest(&self) -> EndpointManifest {
        let mut services: Vec<ServiceManifest> = self
            .services
            .values()
            .map(|svc| ServiceManifest {
                name: svc.name(),
                ty: svc.kind(),
                handlers: svc.handlers().to_vec(),
            })
            .collect();
        services.sort_by(|a, b| a.name.cmp(b.name));
        EndpointManifest { services }
    }
}

#[derive(Default)]
pub struct EndpointBuilder {
    services: Vec<Arc<dyn Service>>,
}

impl EndpointBuilder {
    pub fn bind<S: Service + 'static>(self, service: S) -> Self {
        self.bind_arc(Arc::new(service))
    }

    pub fn bind_arc(mut self, service: Arc<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    pub fn build(self) -> Endpoint {
        let mut services = HashMap::new();
        for service in self.services {
            let name = service.name().to_string();
            tracing::debug!(service = %name, kind = ?service.kind(), "Binding service");
            if services.insert(name.clone(), service).is_some() {
                tracing::warn!("Service {} bound twice, keeping the last binding", name);
            }
        }
        Endpoint { services }
    }
}
