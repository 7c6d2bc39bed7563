pub mod board;
pub mod column;
pub mod config;
pub mod ids;
pub mod label;
pub mod project;
pub mod task;

pub use board::*;
pub use column::*;
pub use config::*;
pub use label::*;
pub use project::*;
pub use task::*;

/// Pick a palette colour by creation index, wrapping around.
pub fn cycle_color(palette: &[&str], index: usize) -> String {
    palette[index % palette.len()].to_string()
}
