//! Cookie wire-format codec and an in-memory jar.
//!
//! The document-level cookie string is a single line of `name=value` pairs
//! separated by `"; "`. A write is expressed as one assignment string carrying
//! the pair plus its attributes (`path=/; max-age=<seconds>`); a max-age of
//! zero or less deletes. Values are percent-encoded so separators and controls
//! can never corrupt the pair syntax.
//!
//! [`CookieJar`] is a stand-in for the document cookie sink: it ingests the
//! same assignment strings a browser receives and renders the same
//! `name=value; other=value` view a document exposes, including max-age
//! expiry. The cookie backend runs identically against the jar and the real
//! DOM sink, which is what makes the cookie path testable off the browser.

use std::cell::{Cell, RefCell};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::consts::{COOKIE_PATH, SECONDS_PER_DAY};

/// Bytes percent-encoded in cookie values: controls plus every character with
/// meaning in the pair syntax or the percent encoding itself.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b',')
    .add(b';')
    .add(b'=')
    .add(b'\\');

/// Attributes attached to a cookie write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieAttributes {
    /// Cookie path; fixed to the site root so every page observes the record.
    pub path: &'static str,
    /// Lifetime in whole seconds; zero or negative expresses deletion.
    pub max_age_secs: i64,
}

impl CookieAttributes {
    /// Attributes for a record that should live `expire_days` from now.
    ///
    /// Fractional days are allowed; seconds are truncated toward zero, so any
    /// configured expiry of zero days or less produces a deleting write.
    pub fn from_expire_days(expire_days: f64) -> Self {
        Self {
            path: COOKIE_PATH,
            max_age_secs: (expire_days * SECONDS_PER_DAY as f64) as i64,
        }
    }

    /// Attributes expressing immediate deletion.
    pub fn expired() -> Self {
        Self {
            path: COOKIE_PATH,
            max_age_secs: 0,
        }
    }
}

/// Extract the decoded value of the cookie named `name` from a document
/// cookie string.
///
/// Exact-name matches only: `"counter"` never matches `"counter2"` or
/// `"my_counter"`. Malformed percent sequences pass through verbatim and
/// invalid UTF-8 decodes lossily, so a corrupt record surfaces to the parse
/// layer instead of silently reading as absent.
pub fn get(header: &str, name: &str) -> Option<String> {
    for pair in header.split(';') {
        let Some((pair_name, pair_value)) = pair.split_once('=') else {
            continue;
        };
        if pair_name.trim() == name {
            return Some(percent_decode_str(pair_value).decode_utf8_lossy().into_owned());
        }
    }
    None
}

/// Render the assignment string for writing `name=value` with `attrs`.
pub fn build(name: &str, value: &str, attrs: &CookieAttributes) -> String {
    format!(
        "{}={}; path={}; max-age={}",
        name,
        utf8_percent_encode(value, COOKIE_VALUE),
        attrs.path,
        attrs.max_age_secs
    )
}

#[derive(Debug, Clone)]
struct JarEntry {
    name: String,
    /// Stored in encoded form, exactly as assigned; decoding is the
    /// reader's job, as in a real document.
    encoded_value: String,
    /// Absolute expiry on the jar clock; `None` is a session cookie.
    expires_at: Option<u64>,
}

/// In-memory document cookie sink.
///
/// Expiry runs on a manual clock ([`CookieJar::advance_secs`]) so tests stay
/// deterministic. Entries keep insertion order, matching how a document
/// renders its cookie string.
#[derive(Debug, Default)]
pub struct CookieJar {
    entries: RefCell<Vec<JarEntry>>,
    now_secs: Cell<u64>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one assignment string, as `document.cookie = ...` would.
    ///
    /// The first `name=value` pair addresses the record; a `max-age`
    /// attribute of zero or less deletes it, a positive one sets its expiry,
    /// and an absent one makes a session cookie. Unknown attributes are
    /// ignored. Assignments without a pair are dropped silently, matching
    /// the sink's forgiving contract.
    pub fn assign(&self, assignment: &str) {
        let mut segments = assignment.split(';');
        let Some((name, value)) = segments.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim().to_string();

        let mut max_age: Option<i64> = None;
        for attr in segments {
            let (attr_name, attr_value) = match attr.split_once('=') {
                Some((n, v)) => (n.trim(), v.trim()),
                None => (attr.trim(), ""),
            };
            if attr_name.eq_ignore_ascii_case("max-age") {
                max_age = attr_value.parse().ok();
            }
        }

        let mut entries = self.entries.borrow_mut();
        match max_age {
            Some(secs) if secs <= 0 => {
                entries.retain(|entry| entry.name != name);
            }
            _ => {
                let expires_at = max_age.map(|secs| self.now_secs.get() + secs as u64);
                let entry = JarEntry {
                    name: name.clone(),
                    encoded_value: value.to_string(),
                    expires_at,
                };
                match entries.iter_mut().find(|existing| existing.name == name) {
                    Some(existing) => *existing = entry,
                    None => entries.push(entry),
                }
            }
        }
    }

    /// Render the live entries as a document cookie string.
    pub fn cookie_header(&self) -> String {
        self.prune();
        self.entries
            .borrow()
            .iter()
            .map(|entry| format!("{}={}", entry.name, entry.encoded_value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Move the jar clock forward, expiring entries whose max-age has run out.
    pub fn advance_secs(&self, secs: u64) {
        self.now_secs.set(self.now_secs.get() + secs);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.prune();
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self) {
        let now = self.now_secs.get();
        self.entries
            .borrow_mut()
            .retain(|entry| entry.expires_at.is_none_or(|at| at > now));
    }
}
