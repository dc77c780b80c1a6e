/// WhatsApp conversation id (JID), e.g. `9665xxxxxxx@s.whatsapp.net` or `...@g.us`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

impl ChatId {
    /// Group conversations use the `@g.us` server.
    pub fn is_group(&self) -> bool {
        self.0.ends_with("@g.us")
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport message id (opaque string).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);
