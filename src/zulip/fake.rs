//! In-memory `ChatRemote` used by unit tests.

use crate::error::RemoteError;
use crate::zulip::remote::{ChatRemote, MessagePage, MessageWindow, RemoteMessage, RemoteStream};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Default)]
pub struct FakeRemote {
    pub streams: RefCell<Vec<RemoteStream>>,
    /// (stream name, message) pairs; served in id order.
    pub messages: RefCell<Vec<(String, RemoteMessage)>>,
    pub stream_calls: Cell<usize>,
    pub message_calls: Cell<usize>,
    pub windows: RefCell<Vec<MessageWindow>>,
    /// Errors returned, in order, before any real page is served.
    pub queued_errors: RefCell<VecDeque<RemoteError>>,
    /// Fail every message request for this stream with an API error.
    pub failing_stream: RefCell<Option<String>>,
}

pub fn stream(id: i64, name: &str) -> RemoteStream {
    RemoteStream {
        id,
        name: name.to_string(),
        invite_only: false,
        is_web_public: false,
    }
}

pub fn message(id: i64, topic: &str, timestamp: i64) -> RemoteMessage {
    RemoteMessage {
        id,
        sender_full_name: format!("sender-{id}"),
        timestamp,
        content: format!("<p>message {id}</p>"),
        subject: topic.to_string(),
    }
}

pub fn rate_limited(secs: u64) -> RemoteError {
    RemoteError::RateLimited {
        retry_after: Duration::from_secs(secs),
    }
}

impl FakeRemote {
    pub fn with_streams(streams: Vec<RemoteStream>) -> Self {
        Self {
            streams: RefCell::new(streams),
            ..Self::default()
        }
    }

    pub fn post(&self, stream: &str, msg: RemoteMessage) {
        let mut messages = self.messages.borrow_mut();
        messages.push((stream.to_string(), msg));
        messages.sort_by_key(|(_, m)| m.id);
    }

    pub fn total_calls(&self) -> usize {
        self.stream_calls.get() + self.message_calls.get()
    }
}

impl ChatRemote for FakeRemote {
    fn list_streams(&self) -> Result<Vec<RemoteStream>, RemoteError> {
        self.stream_calls.set(self.stream_calls.get() + 1);
        Ok(self.streams.borrow().clone())
    }

    fn list_messages(&self, window: &MessageWindow) -> Result<MessagePage, RemoteError> {
        self.message_calls.set(self.message_calls.get() + 1);
        self.windows.borrow_mut().push(window.clone());

        if let Some(err) = self.queued_errors.borrow_mut().pop_front() {
            return Err(err);
        }
        if self.failing_stream.borrow().as_deref() == Some(window.narrow.stream.as_str()) {
            return Err(RemoteError::Api {
                code: "BAD_REQUEST".to_string(),
                message: "stream unavailable".to_string(),
            });
        }

        let matching = self
            .messages
            .borrow()
            .iter()
            .filter(|(stream, m)| {
                *stream == window.narrow.stream
                    && window.narrow.topic.as_ref().is_none_or(|t| *t == m.subject)
                    && m.id >= window.anchor
            })
            .map(|(_, m)| m.clone())
            .collect::<Vec<_>>();

        let take = window.num_after as usize;
        let found_newest = matching.len() <= take;
        Ok(MessagePage {
            messages: matching.into_iter().take(take).collect(),
            found_newest,
        })
    }
}
