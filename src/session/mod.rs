use crate::history::ChatHistory;
use crate::widgets::motivation::QuoteCursor;
use crate::widgets::notes::Notes;
use crate::widgets::timer::StudyTimer;
use uuid::Uuid;

/// All transient state of one user session. Created when a connection is
/// accepted, dropped with it; every field starts from its default.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: String,
    pub history: ChatHistory,
    pub tools_visible: bool,
    pub timer: StudyTimer,
    pub notes: Notes,
    pub quotes: QuoteCursor,
}

impl SessionContext {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            history: ChatHistory::new(system_prompt),
            tools_visible: false,
            timer: StudyTimer::default(),
            notes: Notes::default(),
            quotes: QuoteCursor::default(),
        }
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn toggle_tools(&mut self) -> bool {
        self.tools_visible = !self.tools_visible;
        self.tools_visible
    }

    pub fn last_assistant_text(&self) -> Option<String> {
        self.history.last_assistant().map(|m| m.text())
    }
}
