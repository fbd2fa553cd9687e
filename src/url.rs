//! # DID URL
//!
//! Destructure `did:webvh` identifiers into strongly typed components and
//! derive the HTTP locations of the log and witness-proof documents.
//!
//! A `did:webvh` DID is of the form
//! `did:webvh:<scid>:<domain>[:<path-segment>…]` where the domain is
//! percent-encoded (a port's colon becomes `%3A`).

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use anyhow::bail;
use nom::bytes::complete::{is_not, tag};
use nom::combinator::all_consuming;
use nom::multi::separated_list1;
use nom::sequence::terminated;
use nom::{IResult, Parser};

use crate::error::Error;

/// Structure of a `did:webvh` DID.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Url {
    /// The self-certifying identifier component.
    pub scid: String,

    /// The domain component, percent-encoded where a port is present.
    pub host: String,

    /// Additional path segments.
    pub path: Vec<String>,
}

impl Display for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "did:webvh:{}:{}", self.scid, self.host)?;
        for segment in &self.path {
            write!(f, ":{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Url {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_did(s) {
            Ok((_, url)) => Ok(url),
            Err(e) => Err(Error::InvalidInput(format!("failed to parse DID {s}: {e}"))),
        }
    }
}

impl Url {
    /// The base HTTP URL for documents belonging to this DID:
    /// `https://<decoded-domain>[/<path>…]`.
    #[must_use]
    pub fn base_url(&self) -> String {
        let domain = self.host.replace("%3A", ":");
        let mut url = format!("https://{domain}");
        for segment in &self.path {
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    /// The HTTP URL of the `did.jsonl` log document.
    #[must_use]
    pub fn http_url(&self) -> String {
        format!("{}/did.jsonl", self.base_url())
    }

    /// The HTTP URL of the `did-witness.json` proof document.
    #[must_use]
    pub fn witness_url(&self) -> String {
        format!("{}/did-witness.json", self.base_url())
    }
}

/// Convert an HTTP URL into a DID bearing the SCID placeholder, suitable as
/// the document id for a create operation.
///
/// Valid examples:
/// - `https://example.com`
/// - `http://example.com/custom/path/`
/// - `https://example.com:8080`
///
/// # Errors
///
/// Will return an error if the URL is invalid or has no host.
pub fn default_did(url: &str) -> anyhow::Result<String> {
    let url = url::Url::parse(url)?;
    let Some(host_str) = url.host_str() else {
        bail!("no host in url");
    };
    let mut host = host_str.to_string();
    if let Some(port) = url.port() {
        host.push_str(&format!("%3A{port}"));
    }
    if let Some(path) = url.path().strip_prefix('/') {
        let trimmed = path.trim_end_matches('/');
        if !trimmed.is_empty() {
            host.push_str(&format!(":{}", trimmed.replace('/', ":")));
        }
    }
    Ok(format!("did:webvh:{}:{host}", crate::SCID_PLACEHOLDER))
}

fn scheme(input: &str) -> IResult<&str, &str> {
    terminated(tag("did"), tag(":")).parse(input)
}

fn method(input: &str) -> IResult<&str, &str> {
    terminated(tag("webvh"), tag(":")).parse(input)
}

fn segments(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list1(tag(":"), is_not(":")).parse(input)
}

fn parse_did(input: &str) -> IResult<&str, Url> {
    let (next, _) = scheme(input)?;
    let (next, _) = method(next)?;
    let (next, mut parts) = all_consuming(segments).parse(next)?;
    if parts.len() < 2 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::SeparatedList,
        )));
    }
    let scid = parts.remove(0).to_string();
    let host = parts.remove(0).to_string();
    Ok((
        next,
        Url {
            scid,
            host,
            path: parts.into_iter().map(ToString::to_string).collect(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_did() {
        let url = Url::from_str("did:webvh:QmaJp6pmb6RUk4oaDyWQcjeqYbvxsc3kvmHWPpz7B5JwDU:example.com")
            .expect("should parse");
        assert_eq!(url.scid, "QmaJp6pmb6RUk4oaDyWQcjeqYbvxsc3kvmHWPpz7B5JwDU");
        assert_eq!(url.host, "example.com");
        assert!(url.path.is_empty());
        assert_eq!(url.http_url(), "https://example.com/did.jsonl");
        assert_eq!(
            url.to_string(),
            "did:webvh:QmaJp6pmb6RUk4oaDyWQcjeqYbvxsc3kvmHWPpz7B5JwDU:example.com"
        );
    }

    #[test]
    fn did_with_path() {
        let url = Url::from_str("did:webvh:QmaJp6:example.com:dids:issuer").expect("should parse");
        assert_eq!(url.path, vec!["dids".to_string(), "issuer".to_string()]);
        assert_eq!(url.http_url(), "https://example.com/dids/issuer/did.jsonl");
        assert_eq!(url.witness_url(), "https://example.com/dids/issuer/did-witness.json");
    }

    #[test]
    fn did_with_port() {
        let url = Url::from_str("did:webvh:QmaJp6:example.com%3A8080").expect("should parse");
        assert_eq!(url.host, "example.com%3A8080");
        assert_eq!(url.http_url(), "https://example.com:8080/did.jsonl");
    }

    #[test]
    fn invalid_dids() {
        for did in [
            "did:web:example.com",
            "did:webvh:example.com",
            "webvh:QmaJp6:example.com",
            "did:webvh:QmaJp6:",
        ] {
            assert!(Url::from_str(did).is_err(), "{did} should not parse");
        }
    }

    #[test]
    fn default_did_from_url() {
        let did = default_did("https://example.com").expect("should convert");
        assert_eq!(did, "did:webvh:{SCID}:example.com");

        let did = default_did("http://example.com/custom/path/").expect("should convert");
        assert_eq!(did, "did:webvh:{SCID}:example.com:custom:path");

        let did = default_did("https://example.com:8080").expect("should convert");
        assert_eq!(did, "did:webvh:{SCID}:example.com%3A8080");
    }
}
