//! Dictation into a text field from a streaming transcriber.
//!
//! The transcriber pushes `(text, is_final)` updates. Interim text is shown
//! after the committed base and replaced by each later update; a final
//! update is appended to the base and becomes the new base.

use planner_core::{PlannerError, PlannerResult};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

impl TranscriptEvent {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

fn join(base: &str, text: &str) -> String {
    let text = text.trim();
    match (base.is_empty(), text.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => text.to_string(),
        (false, false) => format!("{base} {text}"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptBuffer {
    base: String,
    interim: String,
}

impl TranscriptBuffer {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            interim: String::new(),
        }
    }

    pub fn apply(&mut self, event: TranscriptEvent) {
        if event.is_final {
            self.base = join(&self.base, &event.text);
            self.interim.clear();
        } else {
            self.interim = event.text;
        }
    }

    /// Text to display: the committed base followed by any interim text.
    pub fn current(&self) -> String {
        join(&self.base, &self.interim)
    }

    pub fn committed(&self) -> &str {
        &self.base
    }

    /// Consumes the buffer, dropping uncommitted interim text.
    pub fn finish(self) -> String {
        self.base
    }
}

/// A running dictation session.
#[derive(Debug)]
pub struct DictationHandle {
    display: watch::Receiver<String>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<String>,
}

/// Feeds `stream` into a buffer seeded with `base` until the stream ends
/// or [`DictationHandle::stop`] is called.
pub fn start_dictation<S>(base: impl Into<String>, stream: S) -> DictationHandle
where
    S: Stream<Item = TranscriptEvent> + Send + Unpin + 'static,
{
    let mut buffer = TranscriptBuffer::new(base);
    let (display_tx, display) = watch::channel(buffer.current());
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let mut stream = stream;

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                next = stream.next() => match next {
                    Some(event) => {
                        buffer.apply(event);
                        display_tx.send_replace(buffer.current());
                    }
                    None => break,
                },
            }
        }
        debug!(chars = buffer.committed().len(), "Dictation finished");
        buffer.finish()
    });

    DictationHandle {
        display,
        stop_tx: Some(stop_tx),
        task,
    }
}

impl DictationHandle {
    /// Latest display text.
    pub fn current(&self) -> String {
        self.display.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.display.clone()
    }

    /// Stops listening and returns the committed text.
    pub async fn stop(mut self) -> PlannerResult<String> {
        if let Some(tx) = self.stop_tx.take() {
            // The task may already have ended with the stream.
            let _ = tx.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| PlannerError::Internal(e.into()))
    }
}
