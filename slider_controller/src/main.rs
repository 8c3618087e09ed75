use crate::{
    communication::{run_communication_layer, run_console},
    config::init_config,
    controller::Control,
    link::{BroadcastLink, LinkMonitor},
    rig::Rig,
};

use anyhow::{anyhow, Context as _};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use utilities::{applet::App, command_executor::CommandExecutor};

pub mod commands;
pub mod communication;
pub mod config;
pub mod controller;
pub mod hardware;
pub mod link;
pub mod logging;
pub mod models;
pub mod numeric;
pub mod rig;

/// Notifications a slow connection may fall behind by before losing some.
const OUTGOING_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (_config_manager, config) = init_config().map_err(|e| {
        eprintln!("Failed to load configuration: {:#}", e);
        eprintln!("Run with CREATE_CONFIG=1 to create a default configuration file.");
        e
    })?;

    let log_guard = logging::init(&config.logging);
    info!("Starting slider controller");

    // nothing moves until the transport is up
    let listener = TcpListener::bind(&config.transport.listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.transport.listen_address))?;

    let link = BroadcastLink::new(OUTGOING_CAPACITY);
    let Rig {
        slide,
        pan,
        io,
        clock,
    } = Rig::new(&config);

    let mut app = App::new();
    app.add(LinkMonitor::new(
        link.clone(),
        clock,
        config.transport.connection_check_ms,
    ))
    .add(Control::new(&config, slide, pan, io, clock, link.clone()));
    app.setup()?;

    let executor = CommandExecutor::new(app)
        .with_cycle_period(Duration::from_micros(config.control.cycle_period_us));
    let commands = executor.sender();
    let worker = executor.spawn();

    if config.transport.console {
        let console = commands.clone();
        tokio::spawn(async move {
            if let Err(e) = run_console(tokio::io::stdin(), console).await {
                error!("Console stopped: {:#}", e);
            }
        });
    }

    info!("Listening on {}", config.transport.listen_address);

    let result = tokio::select! {
        result = run_communication_layer(listener, commands, link) => result,
        result = worker => match result {
            Ok(result) => result.context("Control worker failed"),
            Err(e) => Err(anyhow!("Control worker panicked: {}", e)),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }

    // the control worker and the stdin reader are blocking threads that
    // would hold the runtime open
    drop(log_guard);
    std::process::exit(if result.is_ok() { 0 } else { 1 });
}
