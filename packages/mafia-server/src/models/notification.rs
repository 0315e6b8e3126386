use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::player::PlayerId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recipient {
    /// The game's public channel, visible to the whole roster.
    Public,
    /// Every mafia-aligned member of the game.
    Mafia,
    /// A direct message to one player.
    Player(PlayerId),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationBody {
    Text(String),
    /// Asks the transport to tear down the game's channel and role.
    CloseChannel,
}

/// One outbound item for the chat transport to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    pub recipient: Recipient,
    pub body: NotificationBody,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipient: Recipient, body: NotificationBody) -> Self {
        Notification {
            notification_id: uuid::Uuid::new_v4().to_string(),
            recipient,
            body,
            timestamp: Utc::now(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            NotificationBody::Text(text) => Some(text),
            NotificationBody::CloseChannel => None,
        }
    }
}

/// Ordered collector for the notifications produced by one command.
#[derive(Debug, Default)]
pub struct Outbox {
    notifications: Vec<Notification>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, recipient: Recipient, text: impl Into<String>) {
        self.notifications
            .push(Notification::new(recipient, NotificationBody::Text(text.into())));
    }

    pub fn public(&mut self, text: impl Into<String>) {
        self.push(Recipient::Public, text);
    }

    pub fn mafia(&mut self, text: impl Into<String>) {
        self.push(Recipient::Mafia, text);
    }

    pub fn private(&mut self, player: &PlayerId, text: impl Into<String>) {
        self.push(Recipient::Player(player.clone()), text);
    }

    pub fn close_channel(&mut self) {
        self.notifications.push(Notification::new(
            Recipient::Public,
            NotificationBody::CloseChannel,
        ));
    }

    pub fn into_vec(self) -> Vec<Notification> {
        self.notifications
    }
}
