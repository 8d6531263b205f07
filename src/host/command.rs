use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Dispatcher;
use crate::model::repository::RepositoryRecord;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Error reported by the host, passed through verbatim.
    #[error("{0}")]
    Host(String),
    #[error("failed to serialize arguments for {command}: {source}")]
    Serialize {
        command: &'static str,
        source: serde_json::Error,
    },
    #[error("failed to decode result of {command}: {source}")]
    Deserialize {
        command: &'static str,
        source: serde_json::Error,
    },
    #[error("host transport failed: {0}")]
    Transport(#[from] std::io::Error),
    #[error("host process disconnected")]
    Disconnected,
}

mod sealed {
    pub trait Sealed {}
}

/// A command the host understands. Sealed: the set below is closed and
/// every host command has exactly one entry.
pub trait Command: sealed::Sealed {
    /// Wire name the host dispatches on.
    const NAME: &'static str;
    type Args: Serialize + Send;
    type Output: DeserializeOwned + Send;
}

/// Argument shape for commands that take nothing. Serializes as `{}`.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct NoArgs {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRepositoryArgs {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRepoArgs {
    pub repo: RepositoryRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResourceArgs {
    pub path: String,
}

macro_rules! commands {
    ($($(#[$meta:meta])* $ty:ident => $name:literal : $args:ty => $output:ty;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub enum $ty {}

            impl sealed::Sealed for $ty {}

            impl Command for $ty {
                const NAME: &'static str = $name;
                type Args = $args;
                type Output = $output;
            }
        )+

        /// Wire names of every host command.
        pub const ALL_COMMANDS: &[&str] = &[$($name),+];
    };
}

commands! {
    /// Full list of registered repositories.
    GetRepositoriesViewModel => "get_repositories_view_model": NoArgs => Vec<RepositoryRecord>;
    /// Download and register the repository JSON at `url`.
    AddRepository => "add_repository": AddRepositoryArgs => RepositoryRecord;
    /// Re-fetch a repository from its update URL.
    UpdateRepo => "update_repo": UpdateRepoArgs => IgnoredAny;
    /// Remove a stored resource by host path.
    DeleteResource => "delete_resource": DeleteResourceArgs => IgnoredAny;
}

/// Typed front of a [`Dispatcher`]. One call, one host round trip; no caching, no retry.
#[derive(Debug, Clone)]
pub struct CommandChannel<D> {
    dispatcher: D,
}

impl<D: Dispatcher> CommandChannel<D> {
    pub fn new(dispatcher: D) -> Self {
        Self { dispatcher }
    }

    #[cfg(test)]
    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub async fn invoke<C: Command>(&self, args: C::Args) -> Result<C::Output, CommandError> {
        let payload = encode_payload(C::NAME, args)?;

        tracing::debug!(command = C::NAME, "invoking host command");
        let result = self.dispatcher.dispatch(C::NAME, payload).await?;

        serde_json::from_value(result).map_err(|source| CommandError::Deserialize {
            command: C::NAME,
            source,
        })
    }

    /// Invoke a command whose argument may be omitted.
    pub async fn invoke_bare<C>(&self) -> Result<C::Output, CommandError>
    where
        C: Command<Args = NoArgs>,
    {
        self.invoke::<C>(NoArgs {}).await
    }
}

/// The host always expects an object, so a null payload becomes `{}`.
fn encode_payload(command: &'static str, args: impl Serialize) -> Result<Value, CommandError> {
    match serde_json::to_value(args) {
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(payload) => Ok(payload),
        Err(source) => Err(CommandError::Serialize { command, source }),
    }
}
