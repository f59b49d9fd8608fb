use clap::Parser;
use durable_patterns::adapters::http;
use durable_patterns::utils::{logger, validation::Validate, validation::validate_socket_addr};
use durable_patterns::{build_endpoint, CliConfig, ExternalClients, LocalRuntime, LocalStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting durable-patterns");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load configuration: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
    let addr = validate_socket_addr("bind_address", &config.server.bind_address)?;

    // 組裝範例與本地 runtime
    let clients = ExternalClients::mock(&config.stubs);
    let storage = LocalStorage::new(config.storage.output_path.clone());
    let endpoint = build_endpoint(&clients, storage, &config.services);
    tracing::info!("📦 Bound {} services", endpoint.len());

    let runtime = LocalRuntime::new(endpoint, config.retry_policy());

    if let Err(e) = http::serve(runtime, addr).await {
        tracing::error!("❌ Ingress failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(3);
    }

    Ok(())
}
