//! Search actions and the single-writer update channel.
//!
//! A [`SearchAction`] is the observable unit of work, one per question.
//! Workers never touch an action directly: they post [`ActionUpdate`]
//! messages through an [`UpdateBus`], and one applier task applies them to
//! the [`ActionLog`] in arrival order. Appends to the same action therefore
//! land in post order without per-field locks, and observers read
//! consistent snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One question/answer transaction.
///
/// `timestamp` and `question` are immutable after creation. `answer` and
/// `related_links` only ever grow, and `finished` flips to `true` exactly
/// once, on stream completion or on any error. Actions are retained for
/// history display for the life of the process.
#[derive(Debug, Clone, Serialize)]
pub struct SearchAction {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub related_links: String,
    pub answer: String,
    pub finished: bool,
}

impl SearchAction {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            question: question.into(),
            related_links: String::new(),
            answer: String::new(),
            finished: false,
        }
    }

    /// A pre-finished entry, e.g. the "Application started" history row.
    pub fn marker(question: impl Into<String>) -> Self {
        let mut action = Self::new(question);
        action.finished = true;
        action
    }

    fn append_answer(&mut self, text: &str) {
        self.answer.push_str(text);
    }

    fn append_related_link(&mut self, link: &str) {
        if !self.related_links.is_empty() {
            self.related_links.push('\n');
        }
        self.related_links.push_str(link);
    }

    fn mark_finished(&mut self) {
        self.finished = true;
    }
}

/// A mutation message for one action.
#[derive(Debug, Clone)]
pub enum ActionUpdate {
    AppendAnswer { id: Uuid, text: String, finish: bool },
    AppendRelatedLink { id: Uuid, link: String },
    Finish { id: Uuid },
}

impl ActionUpdate {
    pub fn action_id(&self) -> Uuid {
        match self {
            ActionUpdate::AppendAnswer { id, .. }
            | ActionUpdate::AppendRelatedLink { id, .. }
            | ActionUpdate::Finish { id } => *id,
        }
    }
}

/// Process-lifetime history of actions.
///
/// The applier task is the only writer of action fields; HTTP observers
/// take read snapshots, which must tolerate high-frequency small appends.
#[derive(Default)]
pub struct ActionLog {
    actions: RwLock<Vec<SearchAction>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new action and hand back the snapshot the caller can
    /// answer with.
    pub async fn insert(&self, action: SearchAction) -> SearchAction {
        self.actions.write().await.push(action.clone());
        action
    }

    pub async fn snapshot(&self) -> Vec<SearchAction> {
        self.actions.read().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<SearchAction> {
        self.actions
            .read()
            .await
            .iter()
            .find(|action| action.id == id)
            .cloned()
    }

    /// Apply one update; returns whether the action was mutated.
    ///
    /// Updates addressed to a terminal action are dropped: a token,
    /// completion or error racing in after the action finished must not
    /// reopen it or grow its text.
    pub async fn apply(&self, update: ActionUpdate) -> bool {
        let mut actions = self.actions.write().await;
        let Some(action) = actions.iter_mut().find(|a| a.id == update.action_id()) else {
            tracing::warn!("Dropping update for unknown action {}", update.action_id());
            return false;
        };
        if action.finished {
            tracing::debug!("Ignoring update for finished action {}", action.id);
            return false;
        }

        match update {
            ActionUpdate::AppendAnswer { text, finish, .. } => {
                action.append_answer(&text);
                if finish {
                    action.mark_finished();
                }
            }
            ActionUpdate::AppendRelatedLink { link, .. } => action.append_related_link(&link),
            ActionUpdate::Finish { .. } => action.mark_finished(),
        }
        true
    }
}

/// Producer handle for posting action updates. Cheap to clone; any number
/// of workers hold one.
#[derive(Clone)]
pub struct UpdateBus {
    tx: mpsc::UnboundedSender<ActionUpdate>,
}

impl UpdateBus {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ActionUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn append_answer(&self, id: Uuid, text: impl Into<String>) {
        self.post(ActionUpdate::AppendAnswer {
            id,
            text: text.into(),
            finish: false,
        });
    }

    /// Append and flip the finished flag in one message, so the terminal
    /// text and the transition cannot be torn apart by interleaving.
    pub fn append_answer_finish(&self, id: Uuid, text: impl Into<String>) {
        self.post(ActionUpdate::AppendAnswer {
            id,
            text: text.into(),
            finish: true,
        });
    }

    pub fn append_related_link(&self, id: Uuid, link: impl Into<String>) {
        self.post(ActionUpdate::AppendRelatedLink {
            id,
            link: link.into(),
        });
    }

    pub fn finish(&self, id: Uuid) {
        self.post(ActionUpdate::Finish { id });
    }

    fn post(&self, update: ActionUpdate) {
        if self.tx.send(update).is_err() {
            tracing::warn!("Update channel closed; dropping action update");
        }
    }
}

/// Spawn the single consumer that applies posted updates in arrival order.
pub fn spawn_applier(
    log: Arc<ActionLog>,
    mut rx: mpsc::UnboundedReceiver<ActionUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            log.apply(update).await;
        }
    })
}
