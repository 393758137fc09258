use crate::archive::index::MessageRecord;
use crate::zulip::remote::RemoteMessage;
use std::collections::BTreeMap;

/// Group messages by exact topic name, keeping input order inside each group.
pub fn partition_by_topic(messages: Vec<RemoteMessage>) -> BTreeMap<String, Vec<MessageRecord>> {
    let mut out: BTreeMap<String, Vec<MessageRecord>> = BTreeMap::new();
    for mut msg in messages {
        let topic = std::mem::take(&mut msg.subject);
        out.entry(topic).or_default().push(MessageRecord::from(msg));
    }
    out
}
