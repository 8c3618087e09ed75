use anyhow::{anyhow, Result};
use std::net::SocketAddr;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, info, instrument, warn};
use utilities::{
    applet::CommandLine, command_executor::CommandSender, line_framer::LineFramer,
};

use crate::link::BroadcastLink;

pub type ControlSender = CommandSender<CommandLine>;

const READ_BUFFER: usize = 1024;

/// Hands one received line to the control worker.
async fn deliver(commands: &ControlSender, line: String) -> Result<()> {
    let recognized = commands
        .send_command(CommandLine(line.clone()))
        .await
        .map_err(|e| anyhow!("Control worker unavailable: {}", e))?;

    if !recognized {
        debug!("Unrecognized command {:?}", line);
    }
    Ok(())
}

#[instrument(name = "connection", skip(socket, commands, link))]
async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    commands: ControlSender,
    link: BroadcastLink,
) -> Result<()> {
    let mut outgoing = link.subscribe();
    let _client = link.connect();

    let (mut reader, mut writer) = socket.into_split();
    let mut framer = LineFramer::default();
    let mut buffer = [0; READ_BUFFER];

    loop {
        tokio::select! {
            read = reader.read(&mut buffer) => {
                let n = read.map_err(|e| anyhow!("Error reading from socket: {}", e))?;
                if n == 0 {
                    return Ok(());
                }
                for line in framer.push(&buffer[..n]) {
                    deliver(&commands, line).await?;
                }
            }
            line = outgoing.recv() => match line {
                Ok(mut line) => {
                    line.push('\n');
                    writer
                        .write_all(line.as_bytes())
                        .await
                        .map_err(|e| anyhow!("Error writing to socket: {}", e))?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Connection fell behind, {} notifications lost", skipped);
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }
}

/// Accepts controller connections until the listener fails. Every
/// connection feeds the same worker and receives every notification.
pub async fn run_communication_layer(
    listener: TcpListener,
    commands: ControlSender,
    link: BroadcastLink,
) -> Result<()> {
    loop {
        let (socket, peer) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("Failed to accept connection: {}", e))?;
        info!("Connection from {}", peer);

        let commands = commands.clone();
        let link = link.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, peer, commands, link).await {
                warn!("Connection from {} failed: {}", peer, e);
            }
            info!("Connection from {} closed", peer);
        });
    }
}

/// Reads command lines from a local stream, typically stdin. Nothing is
/// written back; answers go to the connected controllers.
pub async fn run_console<R: AsyncRead + Unpin>(mut input: R, commands: ControlSender) -> Result<()> {
    let mut framer = LineFramer::default();
    let mut buffer = [0; READ_BUFFER];

    loop {
        let n = input
            .read(&mut buffer)
            .await
            .map_err(|e| anyhow!("Error reading console: {}", e))?;
        if n == 0 {
            debug!("Console closed");
            return Ok(());
        }
        for line in framer.push(&buffer[..n]) {
            deliver(&commands, line).await?;
        }
    }
}
