//! Repository panel state and the host round trips that change it.
//!
//! The panel is a reducer: [`Panel::update`] takes a [`PanelMsg`], adjusts
//! local flags and may return an [`Effect`]. Performing the effect makes one
//! host call and yields the next message. Mutations never edit the directory
//! directly; each successful one is followed by a full reload.

pub mod guard;
pub mod toast;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::host::command::{
    AddRepository, AddRepositoryArgs, DeleteResource, DeleteResourceArgs,
    GetRepositoriesViewModel, UpdateRepo, UpdateRepoArgs,
};
use crate::host::{CommandChannel, CommandError, Dispatcher};
use crate::model::directory::Directory;
use crate::model::repository::RepositoryRecord;

use guard::{DeletionGuard, GuardClick};
use toast::Notifier;

/// Inputs to the panel: user intents and settled host calls.
#[derive(Debug)]
pub enum PanelMsg {
    // -- User intents
    Refresh,
    ShowAddForm,
    HideAddForm,
    AddUrlInput(char),
    AddUrlBackspace,
    SubmitAdd,
    UpdateRequested(RepositoryRecord),
    DeleteClicked(RepositoryRecord),

    // -- Host results
    Loaded(Result<Vec<RepositoryRecord>, CommandError>),
    Added(Result<RepositoryRecord, CommandError>),
    Updated {
        path: String,
        result: Result<(), CommandError>,
    },
    Deleted {
        path: String,
        result: Result<(), CommandError>,
    },
}

/// One host call for the runtime to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Load,
    Add { url: String },
    Update { repo: RepositoryRecord },
    Delete { path: String },
}

impl Effect {
    /// Run the host call and wrap its outcome as the message that settles it.
    pub async fn perform<D: Dispatcher>(self, channel: &CommandChannel<D>) -> PanelMsg {
        match self {
            Effect::Load => PanelMsg::Loaded(
                channel
                    .invoke_bare::<GetRepositoriesViewModel>()
                    .await,
            ),
            Effect::Add { url } => {
                PanelMsg::Added(channel.invoke::<AddRepository>(AddRepositoryArgs { url }).await)
            }
            Effect::Update { repo } => {
                let path = repo.path.clone();
                let result = channel
                    .invoke::<UpdateRepo>(UpdateRepoArgs { repo })
                    .await
                    .map(|_| ());
                PanelMsg::Updated { path, result }
            }
            Effect::Delete { path } => {
                let result = channel
                    .invoke::<DeleteResource>(DeleteResourceArgs { path: path.clone() })
                    .await
                    .map(|_| ());
                PanelMsg::Deleted { path, result }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct AddForm {
    pub visible: bool,
    pub url: String,
    /// An add call is in flight.
    pub submitting: bool,
}

impl AddForm {
    fn close(&mut self) {
        self.visible = false;
        self.url.clear();
        self.submitting = false;
    }
}

pub struct Panel<N> {
    directory: Directory,
    add_form: AddForm,
    refreshing: HashSet<String>,
    guards: HashMap<String, DeletionGuard>,
    confirm_window: Duration,
    notifier: N,
}

impl<N: Notifier> Panel<N> {
    pub fn new(notifier: N, confirm_window: Duration) -> Self {
        Self {
            directory: Directory::default(),
            add_form: AddForm::default(),
            refreshing: HashSet::new(),
            guards: HashMap::new(),
            confirm_window,
            notifier,
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn add_form(&self) -> &AddForm {
        &self.add_form
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    pub fn is_refreshing(&self, path: &str) -> bool {
        self.refreshing.contains(path)
    }

    pub fn is_delete_armed(&self, path: &str) -> bool {
        self.guards.get(path).is_some_and(DeletionGuard::is_armed)
    }

    pub fn update(&mut self, msg: PanelMsg) -> Option<Effect> {
        match msg {
            PanelMsg::Refresh => Some(Effect::Load),
            PanelMsg::ShowAddForm => {
                self.add_form.visible = true;
                None
            }
            PanelMsg::HideAddForm => {
                self.add_form.close();
                None
            }
            PanelMsg::AddUrlInput(ch) => {
                if self.add_form.visible && !self.add_form.submitting {
                    self.add_form.url.push(ch);
                }
                None
            }
            PanelMsg::AddUrlBackspace => {
                if !self.add_form.submitting {
                    self.add_form.url.pop();
                }
                None
            }
            PanelMsg::SubmitAdd => self.submit_add(),
            PanelMsg::UpdateRequested(record) => self.request_update(record),
            PanelMsg::DeleteClicked(record) => self.click_delete(&record.path),
            PanelMsg::Loaded(result) => {
                self.apply_load(result);
                None
            }
            PanelMsg::Added(result) => self.settle_add(result),
            PanelMsg::Updated { path, result } => {
                self.refreshing.remove(&path);
                self.settle_mutation(result, "Repository updated")
            }
            PanelMsg::Deleted { path, result } => {
                // A click while the delete was in flight may have re-armed the row.
                if self.guards.get(&path).is_some_and(|guard| !guard.is_armed()) {
                    self.guards.remove(&path);
                }
                self.settle_mutation(result, "Repository deleted")
            }
        }
    }

    fn submit_add(&mut self) -> Option<Effect> {
        if self.add_form.submitting {
            return None;
        }

        self.add_form.submitting = true;
        let url = self.add_form.url.clone();
        tracing::info!(%url, "adding repository");
        Some(Effect::Add { url })
    }

    fn settle_add(&mut self, result: Result<RepositoryRecord, CommandError>) -> Option<Effect> {
        // The form closes either way; a failed add drops the typed URL too.
        self.add_form.close();

        match result {
            Ok(created) => {
                self.notifier
                    .success(&format!("Added {}", created.name), Some("Repository added"));
                Some(Effect::Load)
            }
            Err(err) => {
                tracing::warn!("add_repository failed: {err}");
                self.notifier.error(&err.to_string());
                None
            }
        }
    }

    fn request_update(&mut self, record: RepositoryRecord) -> Option<Effect> {
        if !record.can_update() {
            tracing::debug!(path = %record.path, "ignoring update for repository without update URL");
            return None;
        }

        if !self.refreshing.insert(record.path.clone()) {
            return None;
        }

        Some(Effect::Update { repo: record })
    }

    fn click_delete(&mut self, path: &str) -> Option<Effect> {
        self.guards.retain(|_, guard| guard.is_armed());

        let window = self.confirm_window;
        let guard = self
            .guards
            .entry(path.to_string())
            .or_insert_with(|| DeletionGuard::new(window));

        match guard.click() {
            GuardClick::Armed => {
                tracing::debug!(%path, "delete armed");
                None
            }
            GuardClick::Confirmed => {
                tracing::info!(%path, "deleting repository");
                Some(Effect::Delete {
                    path: path.to_string(),
                })
            }
        }
    }

    fn settle_mutation(&mut self, result: Result<(), CommandError>, done: &str) -> Option<Effect> {
        match result {
            Ok(()) => {
                self.notifier.success(done, None);
                Some(Effect::Load)
            }
            Err(err) => {
                tracing::warn!("repository mutation failed: {err}");
                self.notifier.error(&err.to_string());
                None
            }
        }
    }

    fn apply_load(&mut self, result: Result<Vec<RepositoryRecord>, CommandError>) {
        match result {
            Ok(records) => {
                tracing::debug!(count = records.len(), "repositories loaded");
                self.directory.replace(records);
            }
            Err(err) => {
                tracing::warn!("get_repositories_view_model failed: {err}");
                self.notifier.error(&err.to_string());
            }
        }
    }
}
