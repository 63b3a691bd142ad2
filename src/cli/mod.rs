mod commands;

pub use commands::{Args, Commands, execute_command};
