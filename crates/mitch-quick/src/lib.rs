pub mod bridge;
pub mod config;
pub mod dom;
pub mod error;
pub mod export;
pub mod format;
pub mod forms;
pub mod host;
pub mod keys;
pub mod notify;
pub mod refresh;
pub mod runtime;
pub mod sanitize;
pub mod script;
pub mod selection;
pub mod table;
pub mod timers;
pub mod transport;
pub mod ui;

pub use error::{Error, Result};
