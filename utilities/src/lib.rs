pub mod applet;
pub mod command_executor;
pub mod line_framer;
pub mod metronome;
