use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use durable_patterns::utils::{logger, validation::validate_url};
use durable_patterns::{IngressClient, Target};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "invoke")]
#[command(about = "Calls the durable-patterns ingress")]
struct Cli {
    #[arg(long, default_value = "http://localhost:9080", help = "Ingress base URL")]
    url: String,

    #[arg(long, help = "Enable verbose output")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Request-response call, e.g. `call GreeterObject/Alice/greet '"Hi"'`
    Call {
        target: String,
        input: Option<String>,
        #[arg(long, help = "Idempotency key for the call")]
        idempotency_key: Option<String>,
    },
    /// One-way call, prints the invocation id
    Send { target: String, input: Option<String> },
    /// Resolve an awakeable with a JSON payload
    Resolve { id: String, payload: Option<String> },
    /// Reject an awakeable
    Reject { id: String, reason: String },
    /// Wait for a workflow run to finish
    Attach { service: String, key: String },
    /// Print a finished workflow result
    Output { service: String, key: String },
}

/// `Service/handler` 或 `Object/key/handler`
fn parse_target(raw: &str) -> anyhow::Result<Target> {
    let parts: Vec<&str> = raw.trim_matches('/').split('/').collect();
    match parts.as_slice() {
        [service, handler] => Ok(Target::service(*service, *handler)),
        [service, key, handler] => Ok(Target::object(*service, *key, *handler)),
        _ => bail!("Invalid target '{}', expected Service/handler or Object/key/handler", raw),
    }
}

fn parse_json(raw: Option<String>) -> anyhow::Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(&raw).with_context(|| format!("Invalid JSON input: {}", raw)),
        None => Ok(Value::Null),
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.verbose);

    validate_url("url", &cli.url)?;
    let client = IngressClient::new(cli.url);

    match cli.command {
        Command::Call {
            target,
            input,
            idempotency_key,
        } => {
            let target = parse_target(&target)?;
            let output: Value = client
                .call_with_key(&target, &parse_json(input)?, idempotency_key.as_deref())
                .await?;
            print_json(&output)?;
        }
        Command::Send { target, input } => {
            let target = parse_target(&target)?;
            let invocation_id = client.send(&target, &parse_json(input)?).await?;
            println!("✅ Accepted: {}", invocation_id);
        }
        Command::Resolve { id, payload } => {
            client.resolve_awakeable(&id, &parse_json(payload)?).await?;
            println!("✅ Resolved {}", id);
        }
        Command::Reject { id, reason } => {
            client.reject_awakeable(&id, &reason).await?;
            println!("✅ Rejected {}", id);
        }
        Command::Attach { service, key } => {
            let output: Value = client.attach_workflow(&service, &key).await?;
            print_json(&output)?;
        }
        Command::Output { service, key } => {
            let output: Value = client.workflow_output(&service, &key).await?;
            print_json(&output)?;
        }
    }

    Ok(())
}
