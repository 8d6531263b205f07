use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use super::Dispatcher;
use super::command::{
    AddRepository, AddRepositoryArgs, Command, CommandError, DeleteResource, DeleteResourceArgs,
    GetRepositoriesViewModel, UpdateRepo, UpdateRepoArgs,
};
use crate::model::repository::RepositoryRecord;

/// In-process stand-in for the host. Keeps repositories in a `Vec` and
/// records every call it receives.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    repos: Vec<RepositoryRecord>,
    calls: Vec<(String, Value)>,
    scripted: HashMap<&'static str, Result<Value, String>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repos(repos: Vec<RepositoryRecord>) -> Self {
        let host = Self::new();
        host.lock().repos = repos;
        host
    }

    /// Every `(command, payload)` received so far, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.lock().calls.clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.lock().calls.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn repos(&self) -> Vec<RepositoryRecord> {
        self.lock().repos.clone()
    }

    /// The next `command` call fails with `message`.
    pub fn fail_next(&self, command: &'static str, message: &str) {
        self.lock().scripted.insert(command, Err(message.to_string()));
    }

    /// The next `command` call answers `value` without touching state.
    pub fn respond_next(&self, command: &'static str, value: Value) {
        self.lock().scripted.insert(command, Ok(value));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, command: &'static str, payload: Value) -> Result<Value, String> {
        let mut state = self.lock();
        state.calls.push((command.to_string(), payload.clone()));

        if let Some(scripted) = state.scripted.remove(command) {
            return scripted;
        }

        match command {
            GetRepositoriesViewModel::NAME => {
                serde_json::to_value(&state.repos).map_err(|e| e.to_string())
            }
            AddRepository::NAME => {
                let args: AddRepositoryArgs =
                    serde_json::from_value(payload).map_err(|e| e.to_string())?;
                if !args.url.starts_with("http") {
                    return Err(format!("relative URL without a base: {}", args.url));
                }

                let slug = args
                    .url
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or("repo")
                    .trim_end_matches(".json")
                    .to_string();
                let record = RepositoryRecord {
                    name: slug.clone(),
                    description: None,
                    path: format!("/repos/{slug}.json"),
                    update_url: Some(args.url),
                    last_updated: "2024-01-01T00:00:00Z".to_string(),
                };
                state.repos.push(record.clone());
                serde_json::to_value(record).map_err(|e| e.to_string())
            }
            UpdateRepo::NAME => {
                let args: UpdateRepoArgs =
                    serde_json::from_value(payload).map_err(|e| e.to_string())?;
                let repo = state
                    .repos
                    .iter_mut()
                    .find(|repo| repo.path == args.repo.path)
                    .ok_or_else(|| format!("No such file: {}", args.repo.path))?;
                repo.last_updated = "2024-06-01T00:00:00Z".to_string();
                Ok(Value::Null)
            }
            DeleteResource::NAME => {
                let args: DeleteResourceArgs =
                    serde_json::from_value(payload).map_err(|e| e.to_string())?;
                let before = state.repos.len();
                state.repos.retain(|repo| repo.path != args.path);
                if state.repos.len() == before {
                    return Err(format!("No such file: {}", args.path));
                }
                Ok(Value::Null)
            }
            other => Err(format!("command {other} not found")),
        }
    }
}

impl Dispatcher for MemoryHost {
    async fn dispatch(&self, command: &'static str, payload: Value) -> Result<Value, CommandError> {
        self.handle(command, payload).map_err(CommandError::Host)
    }
}
