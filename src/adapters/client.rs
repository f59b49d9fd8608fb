use crate::adapters::http::{ErrorBody, SendResponse, IDEMPOTENCY_KEY_HEADER};
use crate::core::Target;
use crate::utils::error::{DurableError, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Thin reqwest client for the HTTP ingress.
#[derive(Debug, Clone)]
pub struct IngressClient {
    client: Client,
    base_url: String,
}

impl IngressClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn target_url(&self, target: &Target) -> String {
        format!("{}/{}", self.base_url, target)
    }

    pub async fn call<Req, Res>(&self, target: &Target, input: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call_with_key(target, input, None).await
    }

    /// Request-response call; the same `idempotency_key` for the same target
    /// returns the first result.
    pub async fn call_with_key<Req, Res>(
        &self,
        target: &Target,
        input: &Req,
        idempotency_key: Option<&str>,
    ) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let url = self.target_url(target);
        tracing::debug!("Calling {}", url);

        let mut request = self.client.post(&url).json(input);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        let response = request.send().await?;
        decode(response).await
    }

    /// One-way call, returns the invocation id
    pub async fn send<Req>(&self, target: &Target, input: &Req) -> Result<String>
    where
        Req: Serialize + ?Sized,
    {
        let url = format!("{}/send", self.target_url(target));
        tracing::debug!("Sending to {}", url);

        let response = self.client.post(&url).json(input).send().await?;
        let accepted: SendResponse = decode(response).await?;
        Ok(accepted.invocation_id)
    }

    pub async fn resolve_awakeable<T>(&self, id: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let url = format!("{}/restate/awakeables/{}/resolve", self.base_url, id);
        let response = self.client.post(&url).json(value).send().await?;
        check(response).await.map(|_| ())
    }

    pub async fn reject_awakeable(&self, id: &str, reason: &str) -> Result<()> {
        let url = format!("{}/restate/awakeables/{}/reject", self.base_url, id);
        let response = self
            .client
            .post(&url)
            .body(reason.to_string())
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    /// Waits until the workflow run finishes
    pub async fn attach_workflow<Res>(&self, service: &str, key: &str) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        let url = format!("{}/restate/workflow/{}/{}/attach", self.base_url, service, key);
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }

    pub async fn workflow_output<Res>(&self, service: &str, key: &str) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        let url = format!("{}/restate/workflow/{}/{}/output", self.base_url, service, key);
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    tracing::debug!("Ingress response status: {}", status);
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await?;
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.message,
        Err(_) => text,
    };
    // 503 代表暫時性失敗，其餘都是呼叫端要處理的錯誤
    if status.as_u16() == 503 {
        Err(DurableError::transient(message))
    } else {
        Err(DurableError::terminal_with_code(status.as_u16(), message))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = check(response).await?.bytes().await?;
    if body.is_empty() {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_slice(&body)?)
}
