use crate::archive::config::StreamSelection;
use crate::zulip::remote::RemoteStream;
use std::collections::BTreeSet;

const WEB_PUBLIC_WILDCARD: &str = "web-public:*";
const PUBLIC_WILDCARD: &str = "public:*";
const BARE_WILDCARD: &str = "*";

/// Decides which streams are archived. Built once from the stream selection settings.
#[derive(Debug, Clone)]
pub struct StreamFilter {
    included: BTreeSet<String>,
    excluded: BTreeSet<String>,
}

impl StreamFilter {
    pub fn new<I, E>(included: I, excluded: E) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            included: included.into_iter().map(Into::into).collect(),
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_selection(selection: &StreamSelection) -> Self {
        Self::new(
            selection.included.iter().cloned(),
            selection.excluded.iter().cloned(),
        )
    }

    pub fn is_included(&self, name: &str, is_public: bool, is_web_public: bool) -> bool {
        if self.excluded.contains(name) {
            return false;
        }
        if is_web_public && self.included.contains(WEB_PUBLIC_WILDCARD) {
            return true;
        }
        // The bare `*` predates `public:*` and means the same thing.
        if is_public
            && (self.included.contains(BARE_WILDCARD) || self.included.contains(PUBLIC_WILDCARD))
        {
            return true;
        }
        self.included.contains(name)
    }

    pub fn admits(&self, stream: &RemoteStream) -> bool {
        self.is_included(&stream.name, stream.is_public(), stream.is_web_public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_streams() -> Vec<String> {
        Vec::new()
    }

    #[test]
    fn wildcard_includes_public_streams() {
        let filter = StreamFilter::new(["*"], no_streams());
        assert!(filter.is_included("general", true, false));
        assert!(!filter.is_included("private", false, false));
    }

    #[test]
    fn explicit_names_are_included_regardless_of_wildcards() {
        let filter = StreamFilter::new(["foo", "bar"], no_streams());
        assert!(filter.is_included("foo", true, false));
        assert!(filter.is_included("bar", true, false));
        assert!(!filter.is_included("baz", true, false));
    }

    #[test]
    fn exclusion_wins_over_any_inclusion() {
        let filter = StreamFilter::new(["*"], ["bad", "worse"]);
        assert!(filter.is_included("good", true, false));
        assert!(!filter.is_included("bad", true, false));
        assert!(!filter.is_included("worse", true, true));

        let filter = StreamFilter::new(["general"], ["general"]);
        assert!(!filter.is_included("general", true, false));
    }

    #[test]
    fn web_public_wildcard_only_matches_web_public_streams() {
        let filter = StreamFilter::new(["web-public:*"], no_streams());
        assert!(filter.is_included("announce", true, true));
        assert!(!filter.is_included("general", true, false));
    }

    #[test]
    fn public_wildcard_matches_like_bare_star() {
        let filter = StreamFilter::new(["public:*"], no_streams());
        assert!(filter.is_included("general", true, false));
        assert!(!filter.is_included("staff", false, false));
    }
}
