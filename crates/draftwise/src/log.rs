//! The ordered conversation log of one session.

use crate::types::{CheckpointId, Delivery, Message, Role};
use serde::{Deserialize, Serialize};

/// Why a checkpoint could not be linked to a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachError {
    /// There is no assistant turn in the log.
    NoAssistantTurn,
    /// The most recent assistant turn already carries this checkpoint.
    AlreadyLinked(CheckpointId),
}

/// Turns in append order.
///
/// Append-only from the store's side: apart from `replace_all` (load and
/// restore), the only change to an existing entry is linking a checkpoint
/// or settling the delivery status of a pending turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return its position.
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Replace the whole log with the backend's canonical list.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Link `checkpoint` to the most recent assistant turn.
    pub fn attach_checkpoint(&mut self, checkpoint: CheckpointId) -> Result<&Message, AttachError> {
        let entry = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .ok_or(AttachError::NoAssistantTurn)?;
        if let Some(existing) = entry.checkpoint {
            return Err(AttachError::AlreadyLinked(existing));
        }
        entry.checkpoint = Some(checkpoint);
        Ok(&*entry)
    }

    /// Unlink `checkpoint` wherever it appears. Returns whether a turn changed.
    pub fn detach_checkpoint(&mut self, checkpoint: CheckpointId) -> bool {
        let mut changed = false;
        for m in self
            .messages
            .iter_mut()
            .filter(|m| m.checkpoint == Some(checkpoint))
        {
            m.checkpoint = None;
            changed = true;
        }
        changed
    }

    /// Settle the delivery status of the turn at `position`.
    pub fn set_delivery(&mut self, position: usize, delivery: Delivery) -> bool {
        match self.messages.get_mut(position) {
            Some(m) => {
                m.delivery = delivery;
                true
            }
            None => false,
        }
    }

    /// The last turn, if and only if it is an assistant turn with a turn
    /// id and no checkpoint yet. Governs whether a checkpoint may be made.
    pub fn latest_restorable_turn(&self) -> Option<&Message> {
        self.messages
            .last()
            .filter(|m| m.role == Role::Assistant && m.turn_id.is_some() && m.checkpoint.is_none())
    }

    /// All checkpoint references in log order.
    pub fn checkpoints(&self) -> impl Iterator<Item = (&Message, CheckpointId)> {
        self.messages
            .iter()
            .filter_map(|m| m.checkpoint.map(|c| (m, c)))
    }

    pub fn get(&self, position: usize) -> Option<&Message> {
        self.messages.get(position)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TurnId;

    fn exchange(log: &mut ConversationLog, turn: u64) {
        log.append(Message::user(format!("ask {}", turn)).with_delivery(Delivery::Confirmed));
        log.append(Message::assistant(format!("answer {}", turn), Some(TurnId(turn))));
    }

    #[test]
    fn test_append_keeps_order() {
        let mut log = ConversationLog::new();
        assert_eq!(log.append(Message::user("Write about cats")), 0);
        assert_eq!(log.len(), 1);
        assert_eq!(log.append(Message::assistant("Here is a draft…", None)), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0].role, Role::User);
        assert!(log.last().unwrap().checkpoint.is_none());
    }

    #[test]
    fn test_iter_from_newest() {
        let mut log = ConversationLog::new();
        exchange(&mut log, 1);
        exchange(&mut log, 2);
        let latest = log.iter().rev().find(|m| m.is_assistant()).unwrap();
        assert_eq!(latest.turn_id, Some(TurnId(2)));
        assert_eq!(log.iter().len(), 4);
    }

    #[test]
    fn test_attach_to_most_recent_assistant() {
        let mut log = ConversationLog::new();
        exchange(&mut log, 1);
        exchange(&mut log, 2);
        log.append(Message::user("pending"));

        let linked = log.attach_checkpoint(CheckpointId(9)).unwrap();
        assert_eq!(linked.turn_id, Some(TurnId(2)));
        assert_eq!(log.messages()[3].checkpoint, Some(CheckpointId(9)));
        assert!(log.messages()[1].checkpoint.is_none());
    }

    #[test]
    fn test_attach_twice_fails() {
        let mut log = ConversationLog::new();
        exchange(&mut log, 1);
        log.attach_checkpoint(CheckpointId(1)).unwrap();
        assert_eq!(
            log.attach_checkpoint(CheckpointId(2)).unwrap_err(),
            AttachError::AlreadyLinked(CheckpointId(1))
        );
    }

    #[test]
    fn test_attach_without_assistant() {
        let mut log = ConversationLog::new();
        log.append(Message::user("hello"));
        assert_eq!(
            log.attach_checkpoint(CheckpointId(1)).unwrap_err(),
            AttachError::NoAssistantTurn
        );
    }

    #[test]
    fn test_latest_restorable_turn() {
        let mut log = ConversationLog::new();
        assert!(log.latest_restorable_turn().is_none());

        exchange(&mut log, 1);
        assert_eq!(log.latest_restorable_turn().unwrap().turn_id, Some(TurnId(1)));

        log.attach_checkpoint(CheckpointId(5)).unwrap();
        assert!(log.latest_restorable_turn().is_none());

        log.append(Message::user("more"));
        assert!(log.latest_restorable_turn().is_none());

        log.append(Message::assistant("no id", None));
        assert!(log.latest_restorable_turn().is_none());
    }

    #[test]
    fn test_detach_checkpoint() {
        let mut log = ConversationLog::new();
        exchange(&mut log, 1);
        log.attach_checkpoint(CheckpointId(4)).unwrap();
        assert!(log.detach_checkpoint(CheckpointId(4)));
        assert!(!log.detach_checkpoint(CheckpointId(4)));
        assert_eq!(log.checkpoints().count(), 0);
    }

    #[test]
    fn test_replace_all() {
        let mut log = ConversationLog::new();
        exchange(&mut log, 1);
        exchange(&mut log, 2);
        log.replace_all(vec![Message::user("only")]);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_set_delivery() {
        let mut log = ConversationLog::new();
        let pos = log.append(Message::user("hi"));
        assert!(log.set_delivery(
            pos,
            Delivery::Failed {
                reason: "offline".into()
            }
        ));
        assert!(log.messages()[pos].delivery.is_failed());
        assert!(!log.set_delivery(7, Delivery::Confirmed));
    }
}
