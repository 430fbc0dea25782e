//! Client merge engine
//!
//! `MergeEngine` owns the view of the selected queue and decides what each
//! push does to it:
//! - `initial_messages` for the selected queue replaces the view
//! - `messages` for the selected queue merges into it
//! - pushes for any other queue, or arriving while paused, are dropped
//!   without touching the view; resuming does not replay them
//! - a malformed push is rejected whole
//!
//! The engine itself is single-threaded. `spawn_engine` moves it onto a task
//! and serializes every entry point (pushes, pagination, UI actions) through
//! one command channel.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::view::MessageView;
use crate::queue::{Message, QueueId};
use crate::transport::message::ServerMessage;
use crate::utils::error::ViewError;

/// What a push did to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Replaced { count: usize },
    Merged { added: usize },
    IgnoredOtherQueue,
    IgnoredPaused,
    Notice(String),
}

impl PushOutcome {
    pub fn changed_view(&self) -> bool {
        match self {
            Self::Replaced { .. } => true,
            Self::Merged { added } => *added > 0,
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct MergeEngine {
    selected: Option<QueueId>,
    paused: bool,
    view: MessageView,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `queue_id`, discarding the view of the previously selected queue.
    pub fn select_queue(&mut self, queue_id: impl Into<QueueId>) {
        self.selected = Some(queue_id.into());
        self.view = MessageView::new();
    }

    pub fn selected_queue(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn replace(&mut self, batch: Vec<Message>) -> usize {
        self.view.replace(batch)
    }

    pub fn append(&mut self, batch: Vec<Message>) -> usize {
        self.view.append(batch)
    }

    pub fn prepend(&mut self, batch: Vec<Message>) -> usize {
        self.view.prepend(batch)
    }

    pub fn ordered_messages(&self) -> Vec<Message> {
        self.view.ordered_messages()
    }

    pub fn view(&self) -> &MessageView {
        &self.view
    }

    pub fn apply(&mut self, push: ServerMessage) -> Result<PushOutcome, ViewError> {
        let (queue_id, messages, snapshot) = match push {
            ServerMessage::InitialMessages { queue_id, messages } => (queue_id, messages, true),
            ServerMessage::Messages { queue_id, messages } => (queue_id, messages, false),
            ServerMessage::Error { message } => return Ok(PushOutcome::Notice(message)),
        };

        if self.selected.as_deref() != Some(queue_id.as_str()) {
            return Ok(PushOutcome::IgnoredOtherQueue);
        }
        if self.paused {
            return Ok(PushOutcome::IgnoredPaused);
        }

        if let Some(position) = messages.iter().position(|m| m.message_id.is_empty()) {
            return Err(ViewError::MissingMessageId(position));
        }

        if snapshot {
            let count = self.view.replace(messages);
            Ok(PushOutcome::Replaced { count })
        } else {
            let added = self.view.prepend(messages);
            Ok(PushOutcome::Merged { added })
        }
    }

    /// Decode a raw push frame and apply it. Anything malformed is logged and
    /// leaves the view as it was.
    pub fn apply_text(&mut self, text: &str) -> Result<PushOutcome, ViewError> {
        let outcome = serde_json::from_str::<ServerMessage>(text)
            .map_err(ViewError::from)
            .and_then(|push| self.apply(push));
        if let Err(e) = &outcome {
            warn!(error = %e, "push rejected");
        }
        outcome
    }
}

/// Everything that can mutate or read the engine, in arrival order.
#[derive(Debug)]
pub enum EngineCommand {
    SelectQueue(QueueId),
    Push(ServerMessage),
    PushText(String),
    Replace(Vec<Message>),
    Append(Vec<Message>),
    Prepend(Vec<Message>),
    Pause,
    Resume,
    Snapshot(oneshot::Sender<Vec<Message>>),
}

/// Cloneable front door of a spawned engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
    revisions: watch::Receiver<u64>,
}

impl EngineHandle {
    fn send(&self, command: EngineCommand) -> Result<(), ViewError> {
        self.commands
            .send(command)
            .map_err(|_| ViewError::EngineClosed)
    }

    pub fn select_queue(&self, queue_id: impl Into<QueueId>) -> Result<(), ViewError> {
        self.send(EngineCommand::SelectQueue(queue_id.into()))
    }

    pub fn push(&self, push: ServerMessage) -> Result<(), ViewError> {
        self.send(EngineCommand::Push(push))
    }

    pub fn push_text(&self, text: impl Into<String>) -> Result<(), ViewError> {
        self.send(EngineCommand::PushText(text.into()))
    }

    pub fn replace(&self, batch: Vec<Message>) -> Result<(), ViewError> {
        self.send(EngineCommand::Replace(batch))
    }

    pub fn append(&self, batch: Vec<Message>) -> Result<(), ViewError> {
        self.send(EngineCommand::Append(batch))
    }

    pub fn prepend(&self, batch: Vec<Message>) -> Result<(), ViewError> {
        self.send(EngineCommand::Prepend(batch))
    }

    pub fn pause(&self) -> Result<(), ViewError> {
        self.send(EngineCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), ViewError> {
        self.send(EngineCommand::Resume)
    }

    /// The ordered view after every command sent before this call.
    pub async fn ordered_messages(&self) -> Result<Vec<Message>, ViewError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot(tx))?;
        rx.await.map_err(|_| ViewError::EngineClosed)
    }

    /// Bumped every time the view changes.
    pub fn revisions(&self) -> watch::Receiver<u64> {
        self.revisions.clone()
    }
}

/// Run `engine` on its own task. The task ends, returning the engine, once
/// every handle has been dropped.
pub fn spawn_engine(mut engine: MergeEngine) -> (EngineHandle, JoinHandle<MergeEngine>) {
    let (commands, mut inbox) = mpsc::unbounded_channel();
    let (revision_tx, revisions) = watch::channel(0u64);

    let task = tokio::spawn(async move {
        while let Some(command) = inbox.recv().await {
            let changed = match command {
                EngineCommand::SelectQueue(queue_id) => {
                    debug!(queue = %queue_id, "queue selected");
                    engine.select_queue(queue_id);
                    true
                }
                EngineCommand::Push(push) => engine
                    .apply(push)
                    .inspect_err(|e| warn!(error = %e, "push rejected"))
                    .is_ok_and(|outcome| outcome.changed_view()),
                EngineCommand::PushText(text) => engine
                    .apply_text(&text)
                    .is_ok_and(|outcome| outcome.changed_view()),
                EngineCommand::Replace(batch) => {
                    engine.replace(batch);
                    true
                }
                EngineCommand::Append(batch) => engine.append(batch) > 0,
                EngineCommand::Prepend(batch) => engine.prepend(batch) > 0,
                EngineCommand::Pause => {
                    engine.pause();
                    false
                }
                EngineCommand::Resume => {
                    engine.resume();
                    false
                }
                EngineCommand::Snapshot(reply) => {
                    let _ = reply.send(engine.ordered_messages());
                    false
                }
            };

            if changed {
                revision_tx.send_modify(|revision| *revision += 1);
            }
        }
        engine
    });

    (EngineHandle { commands, revisions }, task)
}
