mod backend;
mod console;
mod conversation;
mod errors;
mod process;
mod slash_commands;
mod transport;

pub use backend::*;
pub use console::*;
pub use conversation::*;
pub use errors::*;
pub use process::*;
pub use slash_commands::*;
pub use transport::*;
