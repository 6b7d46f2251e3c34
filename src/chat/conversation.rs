//! Conversation transcript

use super::types::{ChatMessage, Role, EMPTY_CONVERSATION};

/// Ordered list of exchanged messages
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, text: &str) {
        self.push(ChatMessage::user(text));
    }

    pub fn push_assistant(&mut self, text: &str) {
        self.push(ChatMessage::assistant(text));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of messages from `role`
    pub fn count_by(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Display lines, or the placeholder when nothing was said yet
    pub fn render_lines(&self) -> Vec<String> {
        if self.messages.is_empty() {
            return vec![EMPTY_CONVERSATION.to_string()];
        }
        self.messages.iter().map(|m| m.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_placeholder() {
        let conversation = Conversation::new();
        assert!(conversation.is_empty());
        assert_eq!(
            conversation.render_lines(),
            vec!["Start a conversation by typing or speaking"]
        );
    }

    #[test]
    fn test_order_preserved() {
        let mut conversation = Conversation::new();
        conversation.push_user("Halo");
        conversation.push_assistant("Halo juga!");
        conversation.push_user("Apa kabar?");

        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.count_by(Role::User), 2);
        assert_eq!(conversation.count_by(Role::Assistant), 1);
        assert_eq!(conversation.last().unwrap().message, "Apa kabar?");
        assert_eq!(
            conversation.render_lines(),
            vec!["You: Halo", "Avatar: Halo juga!", "You: Apa kabar?"]
        );

        conversation.clear();
        assert!(conversation.is_empty());
    }
}
