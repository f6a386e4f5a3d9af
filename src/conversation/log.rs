use super::message::{Message, MessageStatus, NewMessage, Role};
use super::parser::Segments;
use crate::error::{ConsoleError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the change-notification channel; slow subscribers see `Lagged`
const EVENT_CAPACITY: usize = 256;

/// Change notification emitted after every log mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Appended { message: Message },
    Updated { message: Message },
    Finalized { index: u64, status: MessageStatus },
    Cleared,
}

/// Ordered store of conversation turns.
///
/// At most one message may be `Streaming`; when one exists it is the last
/// element and an assistant message. Every mutation goes through the methods
/// below so that invariant is checked, and every mutation is broadcast to
/// subscribers.
pub struct MessageLog {
    messages: Vec<Message>,
    next_index: u64,
    events: broadcast::Sender<LogEvent>,
}

impl MessageLog {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            messages: Vec::new(),
            next_index: 0,
            events,
        }
    }

    /// Append a message at the tail and return its assigned index
    pub fn append(&mut self, new: NewMessage) -> Result<u64> {
        if let Some(streaming) = self.streaming() {
            return Err(ConsoleError::InvalidState(format!(
                "cannot append while message {} is still streaming",
                streaming.index
            )));
        }
        if new.status == MessageStatus::Streaming && new.role != Role::Assistant {
            return Err(ConsoleError::InvalidState(format!(
                "only assistant messages may stream, got {:?}",
                new.role
            )));
        }

        let index = self.next_index;
        self.next_index += 1;

        let message = Message {
            index,
            created_at: Utc::now(),
            role: new.role,
            text: new.text,
            reasoning: String::new(),
            thinking: false,
            status: new.status,
        };

        debug!("Appending {:?} message {} ({:?})", message.role, index, message.status);
        self.messages.push(message.clone());
        self.notify(LogEvent::Appended { message });

        Ok(index)
    }

    /// Replace the text of the streaming tail message
    pub fn update_streaming(&mut self, segments: &Segments, status: MessageStatus) -> Result<()> {
        let tail = self.streaming_tail_mut()?;

        tail.text = segments.answer.clone();
        tail.reasoning = segments.reasoning.clone();
        tail.thinking = segments.is_partial;
        tail.status = status;
        if status.is_terminal() {
            tail.thinking = false;
        }

        let message = tail.clone();
        self.notify(LogEvent::Updated { message });

        Ok(())
    }

    /// Move the streaming tail message to a terminal status.
    ///
    /// Returns `Ok(false)` when nothing is streaming, so late or duplicate
    /// calls are harmless.
    pub fn finalize(&mut self, status: MessageStatus) -> Result<bool> {
        if !status.is_terminal() {
            return Err(ConsoleError::InvalidState(format!(
                "finalize requires a terminal status, got {:?}",
                status
            )));
        }

        let Some(tail) = self.messages.last_mut().filter(|m| m.is_streaming()) else {
            return Ok(false);
        };

        tail.status = status;
        tail.thinking = false;
        let index = tail.index;

        debug!("Finalized message {} as {:?}", index, status);
        self.notify(LogEvent::Finalized { index, status });

        Ok(true)
    }

    /// Empty the log and restart indices at zero
    pub fn clear(&mut self) {
        // Cannot fail: Cancelled is terminal
        let _ = self.finalize(MessageStatus::Cancelled);

        self.messages.clear();
        self.next_index = 0;

        debug!("Message log cleared");
        self.notify(LogEvent::Cleared);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The message currently receiving streamed text, if any
    pub fn streaming(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.is_streaming())
    }

    /// Receive a `LogEvent` for every subsequent mutation
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.events.subscribe()
    }

    fn streaming_tail_mut(&mut self) -> Result<&mut Message> {
        match self.messages.last_mut() {
            Some(tail) if tail.is_streaming() && tail.role == Role::Assistant => Ok(tail),
            Some(tail) => Err(ConsoleError::InvalidState(format!(
                "tail message {} is a {:?} message in {:?} state, not a streaming assistant message",
                tail.index, tail.role, tail.status
            ))),
            None => Err(ConsoleError::InvalidState(
                "message log is empty, nothing is streaming".to_string(),
            )),
        }
    }

    fn notify(&self, event: LogEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}
