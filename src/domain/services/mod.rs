pub mod chat_driver;
mod discovery;
#[cfg(test)]
pub mod fake_host;
pub mod health_prober;
pub mod port_resolver;
pub mod reasoning;
mod supervisor;

pub use discovery::*;
pub use supervisor::*;
