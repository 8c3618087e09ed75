use std::{
    io,
    sync::mpsc::{Receiver, Sender, TryRecvError},
    time::Duration,
};

use tokio::sync::oneshot;
use tracing::{debug, warn};

pub trait Command: Send {
    type Response: Send;
    type Handler: DeviceHandler<Command = Self>;

    fn execute(self, handler: &mut Self::Handler) -> io::Result<Self::Response>;
}

pub trait DeviceHandler {
    type Command: Command<Handler = Self>;

    /// Advances the handler by one control cycle. Called after every drain
    /// of the command queue.
    fn poll(&mut self) {}
}

pub struct GenericCommand<C: Command> {
    command: C,
    response_ch: oneshot::Sender<io::Result<C::Response>>,
}

impl<C: Command> GenericCommand<C> {
    pub fn new(command: C, response_ch: oneshot::Sender<io::Result<C::Response>>) -> Self {
        Self {
            command,
            response_ch,
        }
    }

    pub fn execute(self, handler: &mut C::Handler) -> io::Result<()> {
        let result = self.command.execute(handler);

        self.response_ch
            .send(result)
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "Failed to send response"))?;

        Ok(())
    }
}

/// Owns a handler on a single worker and feeds it queued commands between
/// control cycles. Nothing else ever touches the handler.
pub struct CommandExecutor<H: DeviceHandler + Send + 'static> {
    handler: H,
    commands_ch: Receiver<GenericCommand<H::Command>>,
    sender: Sender<GenericCommand<H::Command>>,
    cycle_period: Duration,
}

impl<H: DeviceHandler + Send> CommandExecutor<H> {
    pub fn new(handler: H) -> Self {
        let (sender, commands_ch) = std::sync::mpsc::channel();

        Self {
            handler,
            commands_ch,
            sender,
            cycle_period: Duration::ZERO,
        }
    }

    /// Sleep between control cycles. Zero only yields the thread.
    pub fn with_cycle_period(mut self, cycle_period: Duration) -> Self {
        self.cycle_period = cycle_period;
        self
    }

    pub fn sender(&self) -> CommandSender<H::Command> {
        CommandSender::new(self.sender.clone())
    }

    /// Runs until every sender handed out by [`CommandExecutor::sender`] is
    /// dropped.
    pub fn run(self) -> io::Result<()> {
        let Self {
            mut handler,
            commands_ch,
            sender,
            cycle_period,
        } = self;
        drop(sender);

        while drain(&commands_ch, &mut handler) {
            handler.poll();

            if cycle_period.is_zero() {
                std::thread::yield_now();
            } else {
                std::thread::sleep(cycle_period);
            }
        }

        debug!("All command senders dropped, executor stopping");
        Ok(())
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<io::Result<()>> {
        tokio::task::spawn_blocking(move || self.run())
    }
}

/// Executes pending commands and returns `false` once all senders are gone.
fn drain<H: DeviceHandler>(
    commands_ch: &Receiver<GenericCommand<H::Command>>,
    handler: &mut H,
) -> bool {
    loop {
        match commands_ch.try_recv() {
            Ok(command) => {
                if let Err(e) = command.execute(handler) {
                    warn!("Command response was not delivered: {}", e);
                }
            }
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}

#[derive(Clone)]
pub struct CommandSender<T: Command> {
    commands_ch: Sender<GenericCommand<T>>,
}

impl<C: Command> CommandSender<C> {
    pub fn new(commands_ch: Sender<GenericCommand<C>>) -> Self {
        Self { commands_ch }
    }

    pub async fn send_command(&self, command: C) -> io::Result<C::Response> {
        let (response_ch, response_rx) = oneshot::channel();
        let command = GenericCommand::new(command, response_ch);

        self.commands_ch
            .send(command)
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "Failed to send command"))?;

        response_rx
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "Failed to receive response"))?
    }
}
