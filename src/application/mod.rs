pub mod cli;
mod connect;
mod settings;
mod terminal;
