pub mod config;
pub mod renew;
pub mod serve;

pub use renew::RenewCommand;
pub use serve::ServeCommand;
