pub mod command;
#[cfg(test)]
pub mod memory;
pub mod stdio;

use std::future::Future;

use serde_json::Value;

pub use command::{CommandChannel, CommandError};

/// The single entry point the host exposes: a command name plus a JSON payload in,
/// a JSON result or error out.
///
/// Implementations must hand errors reported by the host back untouched as
/// [`CommandError::Host`].
pub trait Dispatcher: Send + Sync {
    fn dispatch(
        &self,
        command: &'static str,
        payload: Value,
    ) -> impl Future<Output = Result<Value, CommandError>> + Send;
}
