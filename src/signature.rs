// Request signature generation.
// Hashes a route together with a canonical JSON rendering of the request payload.

use std::fmt::Write;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{EconopsError, Result};

/// Number of hex characters of the route digest kept by [`SignatureScheme::RouteDigest`].
pub const ROUTE_DIGEST_LEN: usize = 8;

/// How the route contributes to the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureScheme {
    /// `sha256("{route}:{payload}")`, 64 hex chars.
    #[default]
    RouteConcat,
    /// First 8 hex chars of `sha256(route)` followed by `sha256(payload)`, 72 hex chars.
    RouteDigest,
}

/// Compute the signature of a call with the default scheme.
///
/// A `pregiven` signature is returned unchanged without looking at the route or payload.
/// An empty `pregiven` signature is rejected.
pub fn call_signature<P>(route: &str, payload: &P, pregiven: Option<&str>) -> Result<String>
where
    P: Serialize + ?Sized,
{
    sign(SignatureScheme::default(), route, payload, pregiven)
}

/// Compute the signature of a call with an explicit scheme.
pub fn sign<P>(
    scheme: SignatureScheme,
    route: &str,
    payload: &P,
    pregiven: Option<&str>,
) -> Result<String>
where
    P: Serialize + ?Sized,
{
    if let Some(signature) = pregiven {
        if signature.is_empty() {
            return Err(EconopsError::InvalidInput(
                "pregiven signature must not be empty".to_string(),
            ));
        }
        return Ok(signature.to_string());
    }

    let canonical = canonical_json(payload)?;

    let signature = match scheme {
        SignatureScheme::RouteConcat => sha256_hex(format!("{}:{}", route, canonical).as_bytes()),
        SignatureScheme::RouteDigest => {
            let mut signature = sha256_hex(route.as_bytes());
            signature.truncate(ROUTE_DIGEST_LEN);
            signature.push_str(&sha256_hex(canonical.as_bytes()));
            signature
        }
    };

    Ok(signature)
}

/// Render a payload as canonical JSON.
///
/// Object keys are sorted at every depth, separators carry no whitespace and
/// every non-ASCII character is written as a `\uXXXX` escape. Payloads that
/// cannot be represented as JSON (e.g. maps with non-string keys) are rejected.
pub fn canonical_json<P>(payload: &P) -> Result<String>
where
    P: Serialize + ?Sized,
{
    let value = serde_json::to_value(payload)?;
    let mut out = String::new();
    write_value(&value, &mut out);
    Ok(out)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Maps keep insertion order under `preserve_order`
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    // Writing to a String cannot fail.
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}
