use chrono::Local;
use uuid::Uuid;

/// A single rendered chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub is_user: bool,
    pub timestamp: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, true)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text, false)
    }

    fn new(text: impl Into<String>, is_user: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            is_user,
            timestamp: Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// An independent conversation thread with its own stored history.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub messages: Vec<Message>,
}

impl Session {
    fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
        }
    }
}

/// In-memory collection of sessions. Exactly one session is current at any
/// time; the list always holds at least one session.
#[derive(Debug)]
pub struct SessionList {
    sessions: Vec<Session>,
    current: Uuid,
}

impl SessionList {
    pub fn new() -> Self {
        let first = Session::empty();
        let current = first.id;
        Self {
            sessions: vec![first],
            current,
        }
    }

    pub fn current_id(&self) -> Uuid {
        self.current
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Creates a fresh empty session and makes it current.
    pub fn new_chat(&mut self) -> Uuid {
        let session = Session::empty();
        let id = session.id;
        self.sessions.push(session);
        self.current = id;
        id
    }

    /// Makes `id` the current session and returns a copy of its stored
    /// messages. Unknown ids are ignored.
    pub fn select(&mut self, id: Uuid) -> Option<Vec<Message>> {
        let session = self.sessions.iter().find(|s| s.id == id)?;
        let messages = session.messages.clone();
        self.current = id;
        Some(messages)
    }

    /// Appends a message to the current session's stored history.
    pub fn push_to_current(&mut self, message: Message) {
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == self.current) {
            session.messages.push(message);
        }
    }
}

impl Default for SessionList {
    fn default() -> Self {
        Self::new()
    }
}
