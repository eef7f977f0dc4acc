use std::thread;
use std::time::Duration;

use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("no API base URL configured (set DRAMAWATCH_API_BASE or --api-base)")]
    NotConfigured,
    #[error("request failed: HTTP status {status}{body}")]
    Status { status: u16, body: String },
    #[error("request failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: usize, last: String },
    #[error("request failed: response decode failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

fn status_detail(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        let truncated = body.chars().take(240).collect::<String>();
        format!(" ({truncated})")
    }
}

pub(crate) fn get_text_with_retries(
    url: &str,
    headers: &[(&str, String)],
    query: &[(String, String)],
    policy: &RetryPolicy,
) -> Result<String, FetchError> {
    let attempts = policy.attempts.max(1);
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(policy.connect_timeout)
        .timeout_read(policy.read_timeout)
        .timeout_write(policy.read_timeout)
        .build();

    let mut last_error = String::from("no attempt was made");
    for attempt in 1..=attempts {
        let mut request = agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        for (key, value) in query {
            request = request.query(key, value);
        }

        match request.call() {
            Ok(response) => {
                return response
                    .into_string()
                    .map_err(|err| FetchError::Decode(err.to_string()));
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = status_detail(&response.into_string().ok().unwrap_or_default());
                if !should_retry_http_status(status) {
                    return Err(FetchError::Status { status, body });
                }
                last_error = format!("HTTP status {status}{body}");
            }
            Err(ureq::Error::Transport(err)) => {
                last_error = format!("transport error: {err}");
            }
        }

        if attempt < attempts {
            debug!("GET {url} attempt {attempt}/{attempts} failed: {last_error}");
            thread::sleep(policy.retry_delay);
        }
    }

    Err(FetchError::Exhausted {
        attempts,
        last: last_error,
    })
}
