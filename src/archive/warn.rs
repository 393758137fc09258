pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub action: &'a str,
    pub stream: &'a str,
    pub retry: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn emit(event: WarnEvent<'_>) {
    tracing::warn!(
        code = %sanitize_value(event.code),
        stage = %sanitize_value(event.stage),
        action = %sanitize_value(event.action),
        stream = %sanitize_value(event.stream),
        retry = %sanitize_value(event.retry),
        reason = %sanitize_value(event.reason),
        err = %sanitize_value(event.err),
        "archive warning"
    );
}

#[cfg(test)]
mod tests {
    use super::sanitize_value;

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn sanitize_value_keeps_non_ascii_stream_names() {
        assert_eq!(sanitize_value("café chat"), "café_chat");
    }
}
