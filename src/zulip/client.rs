use crate::archive::config::ZulipCredentials;
use crate::error::RemoteError;
use crate::zulip::remote::{ChatRemote, MessagePage, MessageWindow, RemoteStream};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const RATE_LIMIT_CODE: &str = "RATE_LIMIT_HIT";
const USER_AGENT: &str = concat!("zulip-archive/", env!("CARGO_PKG_VERSION"));

pub struct ZulipClient {
    http: Client,
    site: String,
    email: String,
    api_key: String,
}

#[derive(Deserialize)]
struct StreamsResponse {
    streams: Vec<RemoteStream>,
}

impl ZulipClient {
    pub fn new(creds: &ZulipCredentials, timeout_secs: u64) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            site: creds.site.clone(),
            email: creds.email.clone(),
            api_key: creds.api_key.clone(),
        })
    }

    fn get(&self, route: &str) -> RequestBuilder {
        self.http
            .get(format!("{}/api/v1/{route}", self.site))
            .basic_auth(&self.email, Some(&self.api_key))
    }

    /// Send a request and turn any non-success envelope into a [`RemoteError`].
    fn send_json(&self, request: RequestBuilder) -> Result<Value, RemoteError> {
        let response = request.send()?;
        let status = response.status();
        let header_retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok());
        let body: Value = response.json().unwrap_or(Value::Null);

        classify_response(status, header_retry_after, body)
    }
}

/// Longest wait honoured for a single rate-limit response.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60 * 60);

fn clamp_retry_after(secs: f64) -> Duration {
    match Duration::try_from_secs_f64(secs) {
        Ok(wait) if wait <= MAX_RETRY_AFTER => wait,
        _ => {
            tracing::warn!(
                requested_secs = secs,
                capped_secs = MAX_RETRY_AFTER.as_secs(),
                "server retry-after out of range; capping"
            );
            MAX_RETRY_AFTER
        }
    }
}

fn classify_response(
    status: StatusCode,
    header_retry_after: Option<f64>,
    body: Value,
) -> Result<Value, RemoteError> {
    let result = body.get("result").and_then(Value::as_str).unwrap_or("");
    let code = body.get("code").and_then(Value::as_str).unwrap_or("");

    if status == StatusCode::TOO_MANY_REQUESTS || code == RATE_LIMIT_CODE {
        let requested = body
            .get("retry-after")
            .and_then(Value::as_f64)
            .or(header_retry_after)
            .unwrap_or(0.0)
            .max(0.0);
        return Err(RemoteError::RateLimited {
            retry_after: clamp_retry_after(requested),
        });
    }

    if !status.is_success() || result == "error" {
        let message = body
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("no error message in response")
            .to_string();
        let code = if code.is_empty() {
            format!("HTTP_{}", status.as_u16())
        } else {
            code.to_string()
        };
        return Err(RemoteError::Api { code, message });
    }

    if body.is_null() {
        return Err(RemoteError::Protocol(format!(
            "empty or non-JSON body with status {status}"
        )));
    }

    Ok(body)
}

impl ChatRemote for ZulipClient {
    fn list_streams(&self) -> Result<Vec<RemoteStream>, RemoteError> {
        let request = self.get("streams").query(&[
            ("include_public", "true"),
            ("include_web_public", "true"),
            ("include_subscribed", "false"),
        ]);
        let body = self.send_json(request)?;
        let parsed: StreamsResponse = serde_json::from_value(body)
            .map_err(|err| RemoteError::Protocol(format!("stream list: {err}")))?;
        Ok(parsed.streams)
    }

    fn list_messages(&self, window: &MessageWindow) -> Result<MessagePage, RemoteError> {
        let narrow = window
            .narrow
            .to_json()
            .map_err(|err| RemoteError::Protocol(format!("narrow encoding: {err}")))?;
        let request = self.get("messages").query(&[
            ("anchor", window.anchor.to_string()),
            ("num_before", window.num_before.to_string()),
            ("num_after", window.num_after.to_string()),
            ("narrow", narrow),
            ("apply_markdown", "true".to_string()),
            ("client_gravatar", "true".to_string()),
        ]);
        let body = self.send_json(request)?;
        serde_json::from_value(body)
            .map_err(|err| RemoteError::Protocol(format!("message page: {err}")))
    }
}
