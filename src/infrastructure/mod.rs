pub mod backends;
pub mod processes;
