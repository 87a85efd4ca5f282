//! User interface rendering.
//!
//! - **renderer**: rendering surface trait and the crossterm console writer
//! - **console**: rendering context that annotates and draws session events

pub mod console;
pub mod renderer;

pub use console::{Console, Flow};
pub use renderer::Renderer;
