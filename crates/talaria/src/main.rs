//! Talaria demo server.
//!
//! Serves two commands under the configured route prefix:
//!
//! - `POST {prefix}/echo` returns the message it was sent
//! - `GET {prefix}/hello` greets the caller, or refuses an empty name
//!
//! Configuration is read from `talaria.toml` (if present), `.env`, and
//! `TALARIA__*` environment variables.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use talaria_config::ConfigLoader;
use talaria_core::{BusinessError, CommandTable, Dispatcher, HandlerResult, RequestContext};
use talaria_server::Server;
use talaria_telemetry::init_logging;

/// Business code returned when `/hello` is called without a name.
const NAME_REQUIRED: i32 = 1001;

#[derive(Debug, Default, Serialize, Deserialize)]
struct EchoRequest {
    message: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EchoResponse {
    message: String,
    request_id: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HelloRequest {
    name: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HelloResponse {
    greeting: String,
}

async fn echo(ctx: RequestContext, req: EchoRequest) -> HandlerResult<EchoResponse> {
    tracing::debug!(len = req.message.len(), "echoing message");
    Ok(Some(EchoResponse {
        message: req.message,
        request_id: ctx.request_id().to_string(),
    }))
}

async fn hello(_ctx: RequestContext, req: HelloRequest) -> HandlerResult<HelloResponse> {
    match req.name.as_deref().map(str::trim) {
        Some("") => Err(BusinessError::new(NAME_REQUIRED, "name must not be blank")
            .with_hint("omit the name field to be greeted anonymously")
            .into()),
        Some(name) => Ok(Some(HelloResponse {
            greeting: format!("Hello, {name}!"),
        })),
        None => Ok(Some(HelloResponse {
            greeting: "Hello, world!".to_string(),
        })),
    }
}

fn commands(prefix: &str) -> CommandTable {
    CommandTable::with_prefix(prefix)
        .post("/echo", echo)
        .get("/hello", hello)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new()
        .with_optional_file("talaria.toml")?
        .with_dotenv()?
        .with_env_prefix("TALARIA")
        .load()
        .context("failed to load configuration")?;

    let logger = init_logging(&config.logging.to_log_config())?;

    let mut server = Server::new(config.server.to_server_config());
    let dispatcher =
        Dispatcher::with_options(logger.into_dispatch(), config.dispatch.to_dispatch_options());
    let count = dispatcher
        .register(commands(&config.dispatch.route_prefix), server.router_mut())
        .context("failed to register commands")?;

    tracing::info!(
        routes = count,
        prefix = %config.dispatch.route_prefix,
        "talaria starting"
    );

    server.run().await?;
    Ok(())
}
