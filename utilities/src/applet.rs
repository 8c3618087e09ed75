use std::io;

use anyhow::Context as _;
use tracing::{debug, info};

use crate::command_executor::{Command, DeviceHandler};

/// A pollable component of the control loop.
pub trait Applet: Send {
    fn name(&self) -> &str;

    /// One-time initialization. An error here is fatal for the whole app.
    fn setup(&mut self) -> anyhow::Result<()>;

    /// One control cycle. Must never block.
    fn run(&mut self);

    /// Handles a command line. Returns `true` when the line was addressed to
    /// this applet, whether or not its contents made sense.
    fn command(&mut self, line: &str) -> bool;
}

/// Ordered polling list of applets.
#[derive(Default)]
pub struct App {
    applets: Vec<Box<dyn Applet>>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, applet: impl Applet + 'static) -> &mut Self {
        self.applets.push(Box::new(applet));
        self
    }

    pub fn setup(&mut self) -> anyhow::Result<()> {
        for applet in self.applets.iter_mut() {
            let name = applet.name().to_string();
            applet
                .setup()
                .with_context(|| format!("Failed to set up {}", name))?;
            info!("{} ready", name);
        }
        Ok(())
    }

    pub fn run(&mut self) {
        for applet in self.applets.iter_mut() {
            applet.run();
        }
    }

    /// Offers the line to each applet in order; the first one that
    /// recognizes it wins.
    pub fn command(&mut self, line: &str) -> bool {
        let recognized = self.applets.iter_mut().any(|applet| applet.command(line));
        if !recognized {
            debug!("No applet recognized {:?}", line);
        }
        recognized
    }
}

/// A received command line, answered with whether any applet recognized it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine(pub String);

impl Command for CommandLine {
    type Response = bool;
    type Handler = App;

    fn execute(self, handler: &mut App) -> io::Result<bool> {
        Ok(handler.command(&self.0))
    }
}

impl DeviceHandler for App {
    type Command = CommandLine;

    fn poll(&mut self) {
        self.run();
    }
}
