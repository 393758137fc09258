//! The remote collaborator seen by the sync engine.
//!
//! Only two operations are needed: listing the streams visible to the
//! authenticated actor and reading a window of messages from a narrow.
//! [`super::client::ZulipClient`] talks to a live server; tests substitute
//! an in-memory fake.

use crate::error::RemoteError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteStream {
    #[serde(rename = "stream_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub invite_only: bool,
    #[serde(default)]
    pub is_web_public: bool,
}

impl RemoteStream {
    pub fn is_public(&self) -> bool {
        !self.invite_only
    }
}

/// A message as delivered by the server. Anything beyond these fields is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteMessage {
    pub id: i64,
    #[serde(default)]
    pub sender_full_name: String,
    pub timestamp: i64,
    #[serde(default)]
    pub content: String,
    #[serde(alias = "topic")]
    pub subject: String,
}

/// The filter half of a message request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrow {
    pub stream: String,
    pub topic: Option<String>,
}

#[derive(Serialize)]
struct NarrowTerm<'a> {
    operator: &'static str,
    operand: &'a str,
}

impl Narrow {
    pub fn stream(name: impl Into<String>) -> Self {
        Self {
            stream: name.into(),
            topic: None,
        }
    }

    /// Wire form: `[{"operator":"stream","operand":..},{"operator":"topic",..}]`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut terms = vec![NarrowTerm {
            operator: "stream",
            operand: &self.stream,
        }];
        if let Some(topic) = &self.topic {
            terms.push(NarrowTerm {
                operator: "topic",
                operand: topic,
            });
        }
        serde_json::to_string(&terms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageWindow {
    pub narrow: Narrow,
    pub anchor: i64,
    pub num_before: u32,
    pub num_after: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<RemoteMessage>,
    #[serde(default)]
    pub found_newest: bool,
}

pub trait ChatRemote {
    /// Public (and web-public) streams visible to the authenticated actor.
    fn list_streams(&self) -> Result<Vec<RemoteStream>, RemoteError>;

    fn list_messages(&self, window: &MessageWindow) -> Result<MessagePage, RemoteError>;
}
