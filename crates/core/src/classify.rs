//! Request classification.
//!
//! Every intercepted request gets exactly one [`Disposition`]:
//!
//! - `QueueOnFailure`: a `POST` to the durable write path. The only writes
//!   that survive connectivity loss; the outbox replays them as `POST`.
//! - `Bypass`: any other write, anything under a live namespace, and any
//!   request that accepts an event stream or an HTML document.
//! - `CacheStrategy`: reads of static assets, by destination hint or by the
//!   versioned static prefix. Served stale-while-revalidate.
//!
//! Anything that matches none of the rules is bypassed.

use serde::{Deserialize, Serialize};

/// Routing decision for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Bypass,
    CacheStrategy,
    QueueOnFailure,
}

/// Resource destination hint (the `Sec-Fetch-Dest` vocabulary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Style,
    Script,
    Image,
    Font,
    Worker,
    Manifest,
    Document,
    Empty,
    Other(String),
}

impl Destination {
    /// Parse a destination hint. Unknown values are kept verbatim.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "style" => Destination::Style,
            "script" => Destination::Script,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "worker" | "sharedworker" | "serviceworker" => Destination::Worker,
            "manifest" => Destination::Manifest,
            "document" | "iframe" | "frame" => Destination::Document,
            "" | "empty" => Destination::Empty,
            other => Destination::Other(other.to_string()),
        }
    }

    /// Static asset kinds eligible for the response cache.
    pub fn is_static_asset(&self) -> bool {
        matches!(
            self,
            Destination::Style
                | Destination::Script
                | Destination::Image
                | Destination::Font
                | Destination::Worker
                | Destination::Manifest
        )
    }
}

/// What the classifier looks at.
#[derive(Debug, Clone)]
pub struct RequestDescriptor<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub accept: Option<&'a str>,
    pub destination: Option<&'a Destination>,
}

/// Routing table for the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRules {
    pub durable_write_path: String,
    pub static_prefix: String,
    pub live_prefixes: Vec<String>,
}

/// Safe, idempotent read methods. Only these are ever cached.
pub fn is_cacheable_read(method: &str) -> bool {
    method.eq_ignore_ascii_case("GET")
}

/// The one method the outbox can replay.
pub fn is_durable_write(method: &str) -> bool {
    method.eq_ignore_ascii_case("POST")
}

fn accepts_fresh_only(accept: &str) -> bool {
    accept
        .split(',')
        .map(|part| part.split(';').next().unwrap_or("").trim())
        .any(|media| media.eq_ignore_ascii_case("text/event-stream") || media.eq_ignore_ascii_case("text/html"))
}

fn same_path(a: &str, b: &str) -> bool {
    let trim = |p: &str| p.trim_end_matches('/').to_string();
    !a.is_empty() && trim(a) == trim(b)
}

/// Classify a request. Pure and deterministic.
pub fn classify(rules: &ClassifierRules, req: &RequestDescriptor<'_>) -> Disposition {
    if is_durable_write(req.method) && same_path(req.path, &rules.durable_write_path) {
        return Disposition::QueueOnFailure;
    }

    if !is_cacheable_read(req.method) {
        return Disposition::Bypass;
    }

    if rules
        .live_prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && req.path.starts_with(prefix.as_str()))
    {
        return Disposition::Bypass;
    }

    if req.accept.is_some_and(accepts_fresh_only) {
        return Disposition::Bypass;
    }

    let static_dest = req.destination.is_some_and(Destination::is_static_asset);
    let static_path = !rules.static_prefix.is_empty() && req.path.starts_with(rules.static_prefix.as_str());
    if static_dest || static_path {
        return Disposition::CacheStrategy;
    }

    Disposition::Bypass
}
