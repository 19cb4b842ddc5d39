mod env;
mod log;
mod monitor;

pub use monitor::start_monitor;
