//! Access log emulation.
//!
//! The embedding server does not write per-request access lines, so this
//! layer produces them:
//!
//! ```text
//! 192.168.88.174 - - "GET /content/x.png" 200 13144 "http://host/learn/" "Mozilla/5.0 ..."
//! ```
//!
//! Combined Log Format without the request time. Lines go to `tracing` under
//! the `perfwatch::access` target.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::Response,
};

use crate::config::AccessLogSection;

pub const ACCESS_TARGET: &str = "perfwatch::access";

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
}

/// Compiled quiet-traffic rules.
#[derive(Debug, Clone)]
pub struct AccessLogRules {
    path_fragments: Vec<String>,
    exact_paths: Vec<String>,
    methods: Vec<Method>,
}

impl AccessLogRules {
    pub fn from_config(cfg: &AccessLogSection) -> Self {
        Self {
            path_fragments: cfg.debug_path_fragments.clone(),
            exact_paths: cfg.debug_exact_paths.clone(),
            // validated at config load
            methods: cfg
                .debug_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
                .collect(),
        }
    }

    pub fn classify(&self, method: &Method, path: &str) -> Severity {
        let quiet = self.path_fragments.iter().any(|f| path.contains(f.as_str()))
            || self.exact_paths.iter().any(|p| p == path)
            || self.methods.contains(method);
        if quiet {
            Severity::Debug
        } else {
            Severity::Info
        }
    }
}

impl Default for AccessLogRules {
    fn default() -> Self {
        Self::from_config(&AccessLogSection::default())
    }
}

/// Fields of one access line. Missing values render as `unknown`.
#[derive(Debug, Clone, Default)]
pub struct AccessRecord {
    pub remote_addr: Option<String>,
    pub method: String,
    pub path: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub status: u16,
    pub body_len: u64,
}

fn escape_quotes(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"")
}

impl AccessRecord {
    pub fn format_line(&self) -> String {
        format!(
            "{} - - \"{} {}\" {} {} \"{}\" \"{}\"",
            self.remote_addr.as_deref().unwrap_or(UNKNOWN),
            self.method,
            escape_quotes(&self.path),
            self.status,
            self.body_len,
            escape_quotes(self.referrer.as_deref().unwrap_or(UNKNOWN)),
            escape_quotes(self.user_agent.as_deref().unwrap_or(UNKNOWN)),
        )
    }
}

pub fn emit(severity: Severity, line: &str) {
    match severity {
        Severity::Debug => tracing::debug!(target: ACCESS_TARGET, "{line}"),
        Severity::Info => tracing::info!(target: ACCESS_TARGET, "{line}"),
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn body_len(response: &Response) -> u64 {
    response.body().size_hint().exact().unwrap_or_else(|| {
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    })
}

/// Outermost layer: runs the rest of the stack, then logs one line.
pub async fn access_log_middleware(
    State(rules): State<Arc<AccessLogRules>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());
    let referrer = header_str(request.headers(), header::REFERER);
    let user_agent = header_str(request.headers(), header::USER_AGENT);

    let response = next.run(request).await;

    let record = AccessRecord {
        remote_addr,
        method: method.to_string(),
        path,
        referrer,
        user_agent,
        status: response.status().as_u16(),
        body_len: body_len(&response),
    };
    emit(rules.classify(&method, &record.path), &record.format_line());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_path_and_patch_are_quiet() {
        let rules = AccessLogRules::default();
        assert_eq!(rules.classify(&Method::GET, "/status/"), Severity::Debug);
        assert_eq!(rules.classify(&Method::PATCH, "/anything/"), Severity::Debug);
        assert_eq!(rules.classify(&Method::GET, "/other/"), Severity::Info);
    }

    #[test]
    fn polling_fragment_matches_anywhere() {
        let rules = AccessLogRules::default();
        assert_eq!(rules.classify(&Method::GET, "/en/api/tasks/tasks/?id=3"), Severity::Debug);
        assert_eq!(rules.classify(&Method::POST, "/api/tasks/"), Severity::Info);
    }

    #[test]
    fn exact_path_is_not_a_prefix_rule() {
        let rules = AccessLogRules::default();
        assert_eq!(rules.classify(&Method::GET, "/status/extra"), Severity::Info);
    }
}
