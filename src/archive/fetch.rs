use crate::archive::rate_limit::{RateLimitedExecutor, Sleeper};
use crate::error::RemoteError;
use crate::zulip::remote::{ChatRemote, MessageWindow, Narrow, RemoteMessage};

pub const DEFAULT_PAGE_SIZE: u32 = 1000;

pub struct MessageFetcher<'a, R: ChatRemote, S: Sleeper> {
    remote: &'a R,
    executor: &'a RateLimitedExecutor<S>,
    page_size: u32,
}

impl<'a, R: ChatRemote, S: Sleeper> MessageFetcher<'a, R, S> {
    pub fn new(remote: &'a R, executor: &'a RateLimitedExecutor<S>, page_size: u32) -> Self {
        Self {
            remote,
            executor,
            page_size: page_size.max(1),
        }
    }

    /// Every message matching `narrow` with id >= `anchor`, in server order (ascending id).
    pub fn fetch_all(&self, narrow: &Narrow, anchor: i64) -> Result<Vec<RemoteMessage>, RemoteError> {
        let mut window = MessageWindow {
            narrow: narrow.clone(),
            anchor,
            num_before: 0,
            num_after: self.page_size,
        };
        let mut out = Vec::new();

        loop {
            let page = self
                .executor
                .execute("messages", &narrow.stream, || self.remote.list_messages(&window))?;

            if page.found_newest {
                out.extend(page.messages);
                return Ok(out);
            }

            let Some(last) = page.messages.last() else {
                return Err(RemoteError::Protocol(format!(
                    "empty page at anchor {} for stream `{}` without found_newest",
                    window.anchor, narrow.stream
                )));
            };
            window.anchor = last.id + 1;
            out.extend(page.messages);
            tracing::debug!(
                stream = %narrow.stream,
                next_anchor = window.anchor,
                fetched = out.len(),
                "fetching next message page"
            );
        }
    }
}
