use anyhow::Result;
use authx_agent::server;
use authx_agent::server::server::AppState;
use authx_agent::services;
use authx_agent::sinks::SinkManager;
use authx_agent::events::EventEmitter;
use authx_agent::utils::channel;
use authx_agent::utils::config_loader;
use authx_agent::utils::logging;
use authx_agent::utils::logging::LogLevel;
use clap::Parser;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "authx-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Read args, load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level)?;

    // -------------------------------
    // 2. Event channel
    // -------------------------------

    let emitter = EventEmitter::new(channel::run());

    // -------------------------------
    // 3. Acquire the service credential and wire services
    // -------------------------------

    let bootstrap = services::initialize(&service_config, emitter.clone())
        .await
        .inspect_err(|e| error!(error = %e, "unable to initialize services"))?;

    // -------------------------------
    // 4. Notification sinks
    // -------------------------------

    let sink_manager = SinkManager::new(service_config.notifications.to_owned());
    let active_sinks = tokio::spawn(async move {
        if let Err(e) = sink_manager.start_active_sinks(emitter).await {
            error!(error = %e, "notification sinks stopped");
        }
    });

    // -------------------------------
    // 5. HTTP server
    // -------------------------------

    let state = AppState::new(
        bootstrap.services,
        bootstrap.gate,
        &service_config.openid.admin_scope,
    )
    .await;
    info!("Service starting...");
    let served = server::server::start(&service_config.settings, state).await;
    active_sinks.abort();
    served
}
