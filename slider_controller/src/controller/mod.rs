pub mod axis;
pub mod buttons;
pub mod control;
pub mod shutter;

#[cfg(test)]
pub mod testing;

pub use control::Control;
