// Control - Controller surface mapping and feedback

pub mod surface;

pub use surface::{Button, ControlAction, ControlSurface};
