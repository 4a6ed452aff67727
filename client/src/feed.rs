//! Rolling feed of relayed UI messages

/// One relayed message and its remaining display time in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct FeedMessage {
    pub text: String,
    pub remaining: f32,
    /// Authority wall clock when the message was relayed
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct MessageFeed {
    messages: Vec<FeedMessage>,
    max_visible: usize,
}

impl MessageFeed {
    pub fn new(max_visible: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_visible,
        }
    }

    pub fn push(&mut self, text: impl Into<String>, display_time: f32, timestamp: u64) {
        self.messages.push(FeedMessage {
            text: text.into(),
            remaining: display_time,
            timestamp,
        });
    }

    /// Decrements every remaining time once and drops expired entries
    pub fn tick(&mut self, dt: f32) {
        for message in &mut self.messages {
            message.remaining -= dt;
        }
        self.messages.retain(|m| m.remaining > 0.0);
    }

    /// Messages to show: one per distinct text (the longest-lived copy),
    /// ordered by descending remaining time and capped.
    pub fn visible(&self) -> Vec<&FeedMessage> {
        let mut unique: Vec<&FeedMessage> = Vec::new();
        for message in &self.messages {
            match unique.iter_mut().find(|m| m.text == message.text) {
                Some(existing) => {
                    if message.remaining > existing.remaining {
                        *existing = message;
                    }
                }
                None => unique.push(message),
            }
        }

        unique.sort_by(|a, b| b.remaining.total_cmp(&a.remaining));
        unique.truncate(self.max_visible);
        unique
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_visible_dedups_orders_and_caps() {
        let mut feed = MessageFeed::new(2);
        feed.push("A", 3.0, 0);
        feed.push("A", 1.0, 0);
        feed.push("B", 5.0, 0);

        let visible = feed.visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].text, "B");
        assert_eq!(visible[1].text, "A");
        assert_approx_eq!(visible[1].remaining, 3.0);
    }

    #[test]
    fn test_tick_expires_messages() {
        let mut feed = MessageFeed::new(5);
        feed.push("short", 0.5, 0);
        feed.push("long", 2.0, 0);

        feed.tick(0.5);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.visible()[0].text, "long");
        assert_approx_eq!(feed.visible()[0].remaining, 1.5);

        feed.tick(1.5);
        assert!(feed.is_empty());
    }

    #[test]
    fn test_cap_of_zero_shows_nothing() {
        let mut feed = MessageFeed::new(0);
        feed.push("hidden", 1.0, 0);
        assert!(feed.visible().is_empty());
        assert_eq!(feed.len(), 1);
    }
}
