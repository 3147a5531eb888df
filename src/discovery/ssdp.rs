//! SSDP datagram classification

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static SEARCH_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^M-SEARCH \* HTTP/1\.\d").expect("valid regex"));

static NOTIFY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^NOTIFY \* HTTP/1\.\d").expect("valid regex"));

/// `MAN` value that marks a discovery search
pub const DISCOVER_MAN: &str = "\"ssdp:discover\"";

/// Kind of inbound SSDP datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsdpMessage {
    /// `M-SEARCH` request with its headers (names lowercased)
    Search(HashMap<String, String>),
    /// `NOTIFY` announcement from another device
    Notify,
    /// Anything else
    Other,
}

impl SsdpMessage {
    /// Whether this is a search carrying `MAN: "ssdp:discover"`
    #[must_use]
    pub fn is_discover(&self) -> bool {
        match self {
            Self::Search(headers) => headers.get("man").is_some_and(|man| man == DISCOVER_MAN),
            Self::Notify | Self::Other => false,
        }
    }
}

/// Classify a datagram by its request line
#[must_use]
pub fn parse(datagram: &[u8]) -> SsdpMessage {
    let text = String::from_utf8_lossy(datagram);
    if SEARCH_LINE.is_match(&text) {
        SsdpMessage::Search(parse_headers(&text))
    } else if NOTIFY_LINE.is_match(&text) {
        SsdpMessage::Notify
    } else {
        SsdpMessage::Other
    }
}

/// Parse header lines after the request line
///
/// Lines without a colon are skipped; the first occurrence of a header wins.
fn parse_headers(text: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in text.split("\r\n").flat_map(|l| l.split('\n')).skip(1) {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers
                .entry(name.trim().to_ascii_lowercase())
                .or_insert_with(|| value.trim().to_string());
        }
    }
    headers
}
