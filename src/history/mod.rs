use crate::models::chat::{ ChatMessage, Role };

/// Ordered conversation of one session. The first entry is always the system
/// prompt; everything after it is appended in arrival order.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    pub fn add_user(&mut self, content: &str) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn add_assistant(&mut self, content: &str) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last message, if and only if it came from the assistant.
    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages.last().filter(|m| m.role == Role::Assistant)
    }

    pub fn count(&self, role: Role) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == role)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_single_system_prompt() {
        let history = ChatHistory::new("be kind");
        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0], ChatMessage::system("be kind"));
        assert!(history.last_assistant().is_none());
    }

    #[test]
    fn last_assistant_requires_assistant_tail() {
        let mut history = ChatHistory::new("sys");
        history.add_user("hi");
        history.add_assistant("hello");
        assert_eq!(history.last_assistant().map(|m| m.text()), Some("hello".to_string()));

        history.add_user("again");
        assert!(history.last_assistant().is_none());
        assert_eq!(history.count(Role::User), 2);
        assert_eq!(history.count(Role::Assistant), 1);
    }
}
