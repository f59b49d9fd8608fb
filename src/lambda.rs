#[cfg(feature = "lambda")]
use aws_config::BehaviorVersion;
#[cfg(feature = "lambda")]
use aws_sdk_s3::config::Region;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use durable_patterns::config::toml_config::{ServicesConfig, StubsConfig};
#[cfg(feature = "lambda")]
use durable_patterns::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use durable_patterns::{build_endpoint, ExternalClients, LambdaConfig, LocalRuntime, S3Storage, Target};
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "lambda")]
use serde_json::Value;

#[cfg(feature = "lambda")]
#[derive(Deserialize)]
pub struct Request {
    pub service: String,
    pub key: Option<String>,
    pub handler: String,
    #[serde(default)]
    pub input: Value,
}

#[cfg(feature = "lambda")]
#[derive(Serialize)]
pub struct Response {
    pub output: Value,
}

#[cfg(feature = "lambda")]
async fn function_handler(runtime: LocalRuntime, event: LambdaEvent<Request>) -> Result<Response, Error> {
    let Request {
        service,
        key,
        handler,
        input,
    } = event.payload;
    let target = Target {
        service,
        key,
        handler,
    };
    tracing::info!(request_id = %event.context.request_id, "Invoking {}", target);

    let output = runtime
        .invoke(target, input)
        .await
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

    Ok(Response { output })
}

#[cfg(feature = "lambda")]
async fn build_runtime() -> Result<LocalRuntime, Error> {
    // 創建Lambda配置
    let lambda_config = LambdaConfig::from_env()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
    lambda_config
        .validate()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

    // 創建AWS配置和S3客戶端
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let region = Region::new(lambda_config.s3_region.clone());
    let config = aws_sdk_s3::config::Builder::from(&config)
        .region(region)
        .force_path_style(true)
        .build();
    let s3_client = S3Client::from_conf(config);

    let storage = S3Storage::new(
        s3_client,
        lambda_config.s3_bucket.clone(),
        lambda_config.s3_prefix.clone(),
    );
    let endpoint = build_endpoint(
        &ExternalClients::mock(&StubsConfig::default()),
        storage,
        &ServicesConfig::default(),
    );

    Ok(LocalRuntime::new(endpoint, lambda_config.retry_policy()))
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    // runtime 的狀態只存在這個執行環境的記憶體裡
    let runtime = build_runtime().await?;

    run(service_fn(move |event| {
        let runtime = runtime.clone();
        async move { function_handler(runtime, event).await }
    }))
    .await
}
