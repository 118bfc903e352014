//! VName node identities and their ticket URI form.
//!
//! A VName is the structured identity of a graph node. Its serialized form is
//! a `kythe:` URI ticket:
//!
//! ```text
//! kythe://corpus?lang=L?path=P?root=R#signature
//! ```
//!
//! Segments are percent-encoded and attributes appear in a fixed order
//! (`lang`, `path`, `root`), so serialization is deterministic and
//! `VName::parse_ticket(t).ticket() == t` for any well-formed ticket.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters escaped in signatures and language attributes: everything but
/// RFC 3986 unreserved characters.
const ATTR_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Characters escaped in corpus, path, and root segments. Slashes are kept
/// readable since these segments are path-shaped.
const PATH_ESCAPES: &AsciiSet = &ATTR_ESCAPES.remove(b'/');

/// Error raised for malformed tickets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// The ticket does not start with the `kythe:` scheme.
    #[error("ticket is missing the kythe: scheme")]
    MissingScheme,
    /// An attribute segment is not of the form `name=value`.
    #[error("malformed ticket attribute {0:?}")]
    MalformedAttribute(String),
    /// An attribute name other than `lang`, `path`, or `root`.
    #[error("unknown ticket attribute {0:?}")]
    UnknownAttribute(String),
    /// A percent-encoded segment did not decode to UTF-8.
    #[error("ticket contains invalid percent-encoding")]
    InvalidEscaping,
}

/// Structured node identity.
///
/// The component order mirrors the wire form: signature distinguishes nodes
/// within a (corpus, root, path) file coordinate, language scopes the
/// signature. The derived `Ord` lets stores key entries by source.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VName {
    pub signature: String,
    pub corpus: String,
    pub root: String,
    pub path: String,
    pub language: String,
}

impl VName {
    /// Parse a `kythe:` ticket URI into its VName.
    pub fn parse_ticket(ticket: &str) -> Result<VName, TicketError> {
        let rest = ticket
            .strip_prefix("kythe:")
            .ok_or(TicketError::MissingScheme)?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);

        let (rest, signature) = match rest.split_once('#') {
            Some((head, fragment)) => (head, decode(fragment)?),
            None => (rest, String::new()),
        };

        let mut segments = rest.split('?');
        let corpus = decode(segments.next().unwrap_or_default())?;

        let mut vname = VName {
            signature,
            corpus,
            ..VName::default()
        };
        for attr in segments {
            let (name, value) = attr
                .split_once('=')
                .ok_or_else(|| TicketError::MalformedAttribute(attr.to_string()))?;
            match name {
                "lang" => vname.language = decode(value)?,
                "path" => vname.path = decode(value)?,
                "root" => vname.root = decode(value)?,
                _ => return Err(TicketError::UnknownAttribute(name.to_string())),
            }
        }
        Ok(vname)
    }

    /// Serialize this VName as its canonical ticket URI.
    pub fn ticket(&self) -> String {
        let mut out = String::from("kythe://");
        out.push_str(&utf8_percent_encode(&self.corpus, PATH_ESCAPES).to_string());
        if !self.language.is_empty() {
            out.push_str("?lang=");
            out.push_str(&utf8_percent_encode(&self.language, ATTR_ESCAPES).to_string());
        }
        if !self.path.is_empty() {
            out.push_str("?path=");
            out.push_str(&utf8_percent_encode(&self.path, PATH_ESCAPES).to_string());
        }
        if !self.root.is_empty() {
            out.push_str("?root=");
            out.push_str(&utf8_percent_encode(&self.root, PATH_ESCAPES).to_string());
        }
        if !self.signature.is_empty() {
            out.push('#');
            out.push_str(&utf8_percent_encode(&self.signature, ATTR_ESCAPES).to_string());
        }
        out
    }

    /// The VName of the file containing this node.
    ///
    /// Anchors live in the same (corpus, root, path) coordinate as their
    /// parent file; the file node itself carries no signature or language.
    pub fn file_vname(&self) -> VName {
        VName {
            corpus: self.corpus.clone(),
            root: self.root.clone(),
            path: self.path.clone(),
            ..VName::default()
        }
    }
}

/// Derive the parent-file ticket of an anchor ticket.
pub fn anchor_file_ticket(anchor_ticket: &str) -> Result<String, TicketError> {
    Ok(VName::parse_ticket(anchor_ticket)?.file_vname().ticket())
}

fn decode(segment: &str) -> Result<String, TicketError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|cow| cow.into_owned())
        .map_err(|_| TicketError::InvalidEscaping)
}
