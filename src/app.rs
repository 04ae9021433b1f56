use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::style::Style;
use throbber_widgets_tui::ThrobberState;
use tokio::sync::mpsc;
use tui_textarea::{Input, TextArea};
use uuid::Uuid;

use crate::config::Config;
use crate::ollama::{ChatTurn, OllamaClient};
use crate::session::{Message, SessionList};

/// Shown in place of an assistant reply when a completion request fails.
pub const COMPLETION_FAILED_REPLY: &str = "Sorry, the request failed. Please try again later.";

#[derive(Debug, PartialEq, Clone)]
pub enum Action {
    Render,
    Resize(u16, u16),
    Quit,
    UserInput(crossterm::event::KeyEvent),
    LoadModels,
    ModelsLoaded(Vec<String>),
    EnterModelSelect,
    SwitchMode(Mode),
    SendMessage,
    CompletionReceived(String),
    CompletionFailed(String),
    NewChat,
    SelectSession(Uuid),
    ToggleHistoryPanel,
    ToggleUseHistory,
    Scroll(i16),
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Mode {
    Insert,
    Normal,
    ModelSelect,
}

pub struct App<'a> {
    pub ollama_client: OllamaClient,
    pub action_tx: mpsc::UnboundedSender<Action>,
    /// The message list currently rendered. Mirrors the current session but is
    /// a separate list; see `send_message` and `CompletionReceived`.
    pub messages: Vec<Message>,
    pub sessions: SessionList,
    pub input: TextArea<'a>,
    pub models: Vec<String>,
    pub selected_model: String,
    pub model_cursor: usize,
    pub use_history: bool,
    pub show_history: bool,
    pub loading: bool,
    pub history_window: usize,
    pub mode: Mode,
    pub vertical_scroll: u16,
    pub auto_scroll: bool,
    pub show_help: bool,
    pub spinner_state: ThrobberState,
    pub session_list_state: ratatui::widgets::ListState,
}

/// Maps the recent conversation plus the new input onto the wire format,
/// oldest first. The history window is taken from the active list as it was
/// before the new message was appended.
pub fn build_chat_turns(
    history: &[Message],
    window: usize,
    use_history: bool,
    text: &str,
) -> Vec<ChatTurn> {
    let mut turns = Vec::new();
    if use_history {
        let start = history.len().saturating_sub(window);
        for msg in &history[start..] {
            if msg.is_user {
                turns.push(ChatTurn::user(msg.text.as_str()));
            } else {
                turns.push(ChatTurn::assistant(msg.text.as_str()));
            }
        }
    }
    turns.push(ChatTurn::user(text));
    turns
}

impl<'a> App<'a> {
    pub fn new(action_tx: mpsc::UnboundedSender<Action>, config: Config) -> Self {
        Self {
            ollama_client: OllamaClient::new(config.ollama_url),
            action_tx,
            messages: Vec::new(),
            sessions: SessionList::new(),
            input: fresh_input(),
            models: Vec::new(),
            selected_model: config.default_model,
            model_cursor: 0,
            use_history: true,
            show_history: false,
            loading: false,
            history_window: config.history_window,
            mode: Mode::Insert,
            vertical_scroll: 0,
            auto_scroll: true,
            show_help: false,
            spinner_state: ThrobberState::default(),
            session_list_state: ratatui::widgets::ListState::default(),
        }
    }

    fn send_message(&mut self) {
        let text = self.input.lines().join("\n");
        if text.trim().is_empty() {
            return;
        }

        // The replayed window must not include the message being sent.
        let turns = build_chat_turns(&self.messages, self.history_window, self.use_history, &text);

        let message = Message::user(text);
        self.sessions.push_to_current(message.clone());
        self.messages.push(message);

        self.input = fresh_input();
        self.loading = true;
        self.auto_scroll = true;

        let model = self.selected_model.clone();
        let client = self.ollama_client.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            match client.chat_completion(&model, turns).await {
                Ok(reply) => {
                    let _ = tx.send(Action::CompletionReceived(reply));
                }
                Err(e) => {
                    let _ = tx.send(Action::CompletionFailed(e.to_string()));
                }
            }
        });
    }

    fn select_session_under_cursor(&mut self) {
        if let Some(idx) = self.session_list_state.selected() {
            if let Some(session) = self.sessions.iter().nth(idx) {
                let _ = self.action_tx.send(Action::SelectSession(session.id));
            }
        }
    }

    fn sync_session_cursor(&mut self) {
        let current = self.sessions.current_id();
        let idx = self.sessions.iter().position(|s| s.id == current);
        self.session_list_state.select(idx);
    }

    pub async fn update(&mut self, action: Action) -> bool {
        match action {
            Action::LoadModels => {
                let client = self.ollama_client.clone();
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    match client.list_models().await {
                        Ok(models) => {
                            let _ = tx.send(Action::ModelsLoaded(models));
                        }
                        // Degrade silently: the configured default model stays
                        // selected and the picker is just empty.
                        Err(e) => tracing::warn!("Failed to fetch model list: {}", e),
                    }
                });
                true
            }
            Action::ModelsLoaded(models) => {
                self.models = models;
                if let Some(first) = self.models.first() {
                    self.selected_model = first.clone();
                    self.model_cursor = 0;
                }
                true
            }
            Action::EnterModelSelect => {
                self.mode = Mode::ModelSelect;
                self.model_cursor = self
                    .models
                    .iter()
                    .position(|m| m == &self.selected_model)
                    .unwrap_or(0);
                true
            }
            Action::SwitchMode(mode) => {
                self.mode = mode;
                true
            }
            Action::SendMessage => {
                self.send_message();
                true
            }
            Action::CompletionReceived(reply) => {
                self.messages.push(Message::assistant(reply));
                self.loading = false;
                self.auto_scroll = true;
                true
            }
            Action::CompletionFailed(err) => {
                tracing::error!("Completion request failed: {}", err);
                self.messages.push(Message::assistant(COMPLETION_FAILED_REPLY));
                self.loading = false;
                self.auto_scroll = true;
                true
            }
            Action::NewChat => {
                self.sessions.new_chat();
                self.messages.clear();
                self.vertical_scroll = 0;
                self.auto_scroll = true;
                self.sync_session_cursor();
                true
            }
            Action::SelectSession(id) => {
                if let Some(messages) = self.sessions.select(id) {
                    self.messages = messages;
                    self.vertical_scroll = 0;
                    self.auto_scroll = true;
                }
                self.sync_session_cursor();
                true
            }
            Action::ToggleHistoryPanel => {
                self.show_history = !self.show_history;
                if self.show_history {
                    self.sync_session_cursor();
                }
                true
            }
            Action::ToggleUseHistory => {
                self.use_history = !self.use_history;
                true
            }
            Action::Scroll(delta) => {
                if delta > 0 {
                    self.vertical_scroll = self.vertical_scroll.saturating_add(delta as u16);
                } else {
                    self.vertical_scroll = self.vertical_scroll.saturating_sub(delta.unsigned_abs());
                }
                self.auto_scroll = false;
                true
            }
            Action::UserInput(key) => {
                // Global shortcuts
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    match key.code {
                        KeyCode::Char('n') => {
                            let _ = self.action_tx.send(Action::NewChat);
                            return true;
                        }
                        KeyCode::Char('h') => {
                            let _ = self.action_tx.send(Action::ToggleHistoryPanel);
                            return true;
                        }
                        KeyCode::Char('t') => {
                            let _ = self.action_tx.send(Action::ToggleUseHistory);
                            return true;
                        }
                        KeyCode::Char('o') => {
                            let _ = self.action_tx.send(Action::EnterModelSelect);
                            return true;
                        }
                        KeyCode::Char('c') => {
                            let _ = self.action_tx.send(Action::Quit);
                            return true;
                        }
                        _ => {}
                    }
                }

                if self.show_help {
                    match key.code {
                        KeyCode::Esc | KeyCode::Char('q') | KeyCode::F(1) => {
                            self.show_help = false;
                        }
                        _ => {}
                    }
                    return true;
                }

                match self.mode {
                    Mode::Insert => match key.code {
                        KeyCode::Esc => {
                            let _ = self.action_tx.send(Action::SwitchMode(Mode::Normal));
                        }
                        KeyCode::F(1) => self.show_help = true,
                        KeyCode::PageUp => {
                            self.vertical_scroll = self.vertical_scroll.saturating_sub(5);
                            self.auto_scroll = false;
                        }
                        KeyCode::PageDown => {
                            self.vertical_scroll = self.vertical_scroll.saturating_add(5);
                            self.auto_scroll = false;
                        }
                        KeyCode::Enter if !key.modifiers.contains(KeyModifiers::SHIFT) => {
                            let _ = self.action_tx.send(Action::SendMessage);
                        }
                        _ => {
                            self.input.input(Input::from(key));
                        }
                    },
                    Mode::Normal => match key.code {
                        KeyCode::Char('i') => {
                            let _ = self.action_tx.send(Action::SwitchMode(Mode::Insert));
                        }
                        KeyCode::Char('q') => {
                            let _ = self.action_tx.send(Action::Quit);
                        }
                        KeyCode::F(1) => self.show_help = true,
                        KeyCode::Up if self.show_history => {
                            let len = self.sessions.len();
                            let i = match self.session_list_state.selected() {
                                Some(0) | None => len.saturating_sub(1),
                                Some(i) => i - 1,
                            };
                            self.session_list_state.select(Some(i));
                        }
                        KeyCode::Down if self.show_history => {
                            let len = self.sessions.len();
                            let i = match self.session_list_state.selected() {
                                Some(i) if i + 1 < len => i + 1,
                                _ => 0,
                            };
                            self.session_list_state.select(Some(i));
                        }
                        KeyCode::Enter if self.show_history => {
                            self.select_session_under_cursor();
                        }
                        KeyCode::Enter => {
                            let _ = self.action_tx.send(Action::SwitchMode(Mode::Insert));
                        }
                        KeyCode::Char('j') | KeyCode::Down => {
                            self.vertical_scroll = self.vertical_scroll.saturating_add(1);
                            self.auto_scroll = false;
                        }
                        KeyCode::Char('k') | KeyCode::Up => {
                            self.vertical_scroll = self.vertical_scroll.saturating_sub(1);
                            self.auto_scroll = false;
                        }
                        KeyCode::PageUp => {
                            self.vertical_scroll = self.vertical_scroll.saturating_sub(10);
                            self.auto_scroll = false;
                        }
                        KeyCode::PageDown => {
                            self.vertical_scroll = self.vertical_scroll.saturating_add(10);
                            self.auto_scroll = false;
                        }
                        _ => {}
                    },
                    Mode::ModelSelect => match key.code {
                        KeyCode::Esc => {
                            let _ = self.action_tx.send(Action::SwitchMode(Mode::Insert));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            if self.model_cursor > 0 {
                                self.model_cursor -= 1;
                            }
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            if self.model_cursor < self.models.len().saturating_sub(1) {
                                self.model_cursor += 1;
                            }
                        }
                        KeyCode::Enter => {
                            if let Some(model) = self.models.get(self.model_cursor) {
                                self.selected_model = model.clone();
                            }
                            let _ = self.action_tx.send(Action::SwitchMode(Mode::Insert));
                        }
                        _ => {}
                    },
                }
                true
            }
            _ => false,
        }
    }
}

fn fresh_input() -> TextArea<'static> {
    let mut textarea = TextArea::default();
    // Disable default cursor line style (underline)
    textarea.set_cursor_line_style(Style::default());
    textarea.set_placeholder_text("Type a message...");
    textarea
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn test_app() -> (App<'static>, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(tx, Config::default()), rx)
    }

    #[tokio::test]
    async fn test_app_initialization() {
        let (app, _rx) = test_app();

        assert!(app.messages.is_empty());
        assert_eq!(app.sessions.len(), 1);
        assert_eq!(app.mode, Mode::Insert);
        assert_eq!(app.selected_model, "llama3.2");
        assert!(app.use_history);
        assert!(!app.show_history);
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_send_appends_to_active_list_and_session() {
        let (mut app, _rx) = test_app();
        app.input.insert_str("hello");

        app.update(Action::SendMessage).await;

        assert_eq!(app.messages.len(), 1);
        assert!(app.messages[0].is_user);
        assert_eq!(app.messages[0].text, "hello");

        let stored = &app.sessions.get(app.sessions.current_id()).unwrap().messages;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "hello");

        assert!(app.loading);
        assert_eq!(app.input.lines().join(""), "");
    }

    #[tokio::test]
    async fn test_send_empty_input_is_noop() {
        let (mut app, _rx) = test_app();

        app.update(Action::SendMessage).await;
        assert!(app.messages.is_empty());
        assert!(!app.loading);

        app.input.insert_str("   ");
        app.update(Action::SendMessage).await;
        assert!(app.messages.is_empty());
        assert_eq!(app.sessions.get(app.sessions.current_id()).unwrap().messages.len(), 0);
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_completion_received_appends_assistant_message() {
        let (mut app, _rx) = test_app();
        app.loading = true;

        app.update(Action::CompletionReceived("hi there".to_string())).await;

        assert_eq!(app.messages.len(), 1);
        assert!(!app.messages[0].is_user);
        assert_eq!(app.messages[0].text, "hi there");
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_completion_failure_appends_apology() {
        let (mut app, _rx) = test_app();
        app.loading = true;

        app.update(Action::CompletionFailed("connection refused".to_string()))
            .await;

        assert_eq!(app.messages.len(), 1);
        assert!(!app.messages[0].is_user);
        assert_eq!(app.messages[0].text, COMPLETION_FAILED_REPLY);
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_assistant_reply_only_lands_in_active_list() {
        let (mut app, _rx) = test_app();
        app.input.insert_str("hello");
        app.update(Action::SendMessage).await;
        app.update(Action::CompletionReceived("hi there".to_string())).await;

        assert_eq!(app.messages.len(), 2);
        // The stored session still only holds the user turn.
        let stored = &app.sessions.get(app.sessions.current_id()).unwrap().messages;
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_user);
    }

    #[tokio::test]
    async fn test_new_chat_clears_active_list() {
        let (mut app, _rx) = test_app();
        let first = app.sessions.current_id();
        app.messages.push(Message::user("hello"));

        app.update(Action::NewChat).await;

        assert!(app.messages.is_empty());
        assert_eq!(app.sessions.len(), 2);
        assert_ne!(app.sessions.current_id(), first);
    }

    #[tokio::test]
    async fn test_switch_session_restores_stored_messages() {
        let (mut app, _rx) = test_app();
        let first = app.sessions.current_id();
        app.input.insert_str("hello");
        app.update(Action::SendMessage).await;
        app.update(Action::CompletionReceived("hi there".to_string())).await;

        app.update(Action::NewChat).await;
        assert!(app.messages.is_empty());

        app.update(Action::SelectSession(first)).await;
        assert_eq!(app.sessions.current_id(), first);
        // Only the user turn was ever written back to the session store, so
        // the assistant reply does not survive the round trip.
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].text, "hello");
    }

    #[tokio::test]
    async fn test_select_unknown_session_is_ignored() {
        let (mut app, _rx) = test_app();
        app.messages.push(Message::user("hello"));

        app.update(Action::SelectSession(Uuid::new_v4())).await;
        assert_eq!(app.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_toggles_flip_flags() {
        let (mut app, _rx) = test_app();

        app.update(Action::ToggleHistoryPanel).await;
        assert!(app.show_history);
        app.update(Action::ToggleHistoryPanel).await;
        assert!(!app.show_history);

        app.update(Action::ToggleUseHistory).await;
        assert!(!app.use_history);
        app.update(Action::ToggleUseHistory).await;
        assert!(app.use_history);
    }

    #[tokio::test]
    async fn test_models_loaded_selects_first() {
        let (mut app, _rx) = test_app();

        let models = vec!["mistral".to_string(), "phi3".to_string()];
        app.update(Action::ModelsLoaded(models.clone())).await;

        assert_eq!(app.models, models);
        assert_eq!(app.selected_model, "mistral");
    }

    #[tokio::test]
    async fn test_models_loaded_empty_keeps_default() {
        let (mut app, _rx) = test_app();

        app.update(Action::ModelsLoaded(Vec::new())).await;

        assert!(app.models.is_empty());
        assert_eq!(app.selected_model, "llama3.2");
    }

    #[tokio::test]
    async fn test_model_select_picks_under_cursor() {
        let (mut app, mut rx) = test_app();
        app.update(Action::ModelsLoaded(vec![
            "mistral".to_string(),
            "phi3".to_string(),
        ]))
        .await;
        app.update(Action::EnterModelSelect).await;
        assert_eq!(app.mode, Mode::ModelSelect);

        app.update(Action::UserInput(KeyEvent::new(KeyCode::Down, KeyModifiers::empty())))
            .await;
        app.update(Action::UserInput(KeyEvent::new(KeyCode::Enter, KeyModifiers::empty())))
            .await;

        assert_eq!(app.selected_model, "phi3");
        match rx.recv().await {
            Some(Action::SwitchMode(Mode::Insert)) => {}
            other => panic!("Expected SwitchMode(Insert), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_user_typing() {
        let (mut app, _rx) = test_app();

        let key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::empty());
        app.update(Action::UserInput(key)).await;

        assert_eq!(app.input.lines()[0], "a");
    }

    #[tokio::test]
    async fn test_enter_in_insert_mode_sends() {
        let (mut app, mut rx) = test_app();
        app.input.insert_str("hello");

        app.update(Action::UserInput(KeyEvent::new(KeyCode::Enter, KeyModifiers::empty())))
            .await;

        match rx.recv().await {
            Some(Action::SendMessage) => {}
            other => panic!("Expected SendMessage, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_cursor_navigation_in_history_panel() {
        let (mut app, mut rx) = test_app();
        let first = app.sessions.current_id();
        app.update(Action::NewChat).await;
        app.update(Action::NewChat).await;
        app.update(Action::ToggleHistoryPanel).await;
        app.update(Action::SwitchMode(Mode::Normal)).await;

        // Cursor starts on the current (third) session; wrap to the first.
        app.update(Action::UserInput(KeyEvent::new(KeyCode::Down, KeyModifiers::empty())))
            .await;
        app.update(Action::UserInput(KeyEvent::new(KeyCode::Enter, KeyModifiers::empty())))
            .await;

        match rx.recv().await {
            Some(Action::SelectSession(id)) => assert_eq!(id, first),
            other => panic!("Expected SelectSession, got {:?}", other),
        }
    }

    #[test]
    fn test_turns_without_history_contain_only_new_input() {
        let history: Vec<Message> = (0..30)
            .map(|i| Message::user(format!("msg{}", i)))
            .collect();

        let turns = build_chat_turns(&history, 14, false, "latest");
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0], ChatTurn::user("latest"));
    }

    #[test]
    fn test_turns_with_history_cap_at_window_plus_one() {
        let mut history = Vec::new();
        for i in 0..20 {
            if i % 2 == 0 {
                history.push(Message::user(format!("q{}", i)));
            } else {
                history.push(Message::assistant(format!("a{}", i)));
            }
        }

        let turns = build_chat_turns(&history, 14, true, "latest");
        assert_eq!(turns.len(), 15);
        // Oldest retained entry is history[6]; ordering is chronological.
        assert_eq!(turns[0].content, "q6");
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].content, "a7");
        assert_eq!(turns[1].role, "assistant");
        assert_eq!(turns[14], ChatTurn::user("latest"));
    }

    #[test]
    fn test_turns_with_short_history_keep_everything() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];

        let turns = build_chat_turns(&history, 14, true, "latest");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
        assert_eq!(turns[2].content, "latest");
    }
}
