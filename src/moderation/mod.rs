pub mod actions;
pub mod gate;
