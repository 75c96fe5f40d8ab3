//! The unit routed by the message bus.

use crate::identity::commands::{Command, CommandKind};
use crate::identity::events::{Event, EventKind};

/// Either a command (one handler, fail-loud) or an event (any number of
/// handlers, fail-soft).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command(Command),
    Event(Event),
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::Command(command) => command.name(),
            Message::Event(event) => event.name(),
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Message::Command(_))
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Message::Event(event)
    }
}

/// A concrete command payload type.
///
/// Implemented for every command struct so handlers can be registered
/// against the struct and receive it already unwrapped.
pub trait CommandType: Send + Sync + 'static {
    const KIND: CommandKind;

    fn from_command(command: &Command) -> Option<&Self>;
}

/// A concrete event payload type.
pub trait EventType: Clone + Into<Event> + Send + Sync + 'static {
    const KIND: EventKind;

    fn from_event(event: &Event) -> Option<&Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::commands::CreateRole;
    use crate::identity::events::RoleCreated;

    #[test]
    fn names_follow_payload() {
        let command: Message = Command::from(CreateRole::new("admin", vec![])).into();
        let event: Message = Event::from(RoleCreated {
            role: "admin".to_string(),
            permissions: vec![],
        })
        .into();

        assert_eq!(command.name(), "CreateRole");
        assert!(command.is_command());
        assert_eq!(event.name(), "RoleCreated");
        assert!(!event.is_command());
    }
}
