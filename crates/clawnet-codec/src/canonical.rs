//! JSON Canonicalization Scheme (RFC 8785) over `serde_json::Value`
//! (spec.md §4.1, operation 1).
//!
//! `serde_json` alone does not give JCS: object-key order depends on
//! feature flags, and `f64` formatting does not distinguish "was this an
//! integer in the source" from "was this a float that happens to be whole".
//! We serialize by hand instead of going through `serde_json::to_string`.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("non-finite float cannot be canonicalized")]
    NonFiniteFloat,
    #[error("object key is not valid UTF-8")]
    InvalidKey,
    #[error("value serialization failed: {0}")]
    Serialize(String),
}

/// Serialize `value` to its JCS canonical byte form.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let json = serde_json::to_value(value).map_err(|e| CanonicalError::Serialize(e.to_string()))?;
    let mut out = String::new();
    write_value(&json, &mut out)?;
    Ok(out.into_bytes())
}

fn write_value(v: &serde_json::Value, out: &mut String) -> Result<(), CanonicalError> {
    match v {
        serde_json::Value::Null => out.push_str("null"),
        serde_json::Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        serde_json::Value::Number(n) => write_number(n, out)?,
        serde_json::Value::String(s) => write_string(s, out),
        serde_json::Value::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        serde_json::Value::Object(map) => {
            // RFC 8785 §3.2.3: sort keys by UTF-16 code unit, not UTF-8 byte
            // order — the two diverge for astral-plane characters.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| utf16_units(a).cmp(&utf16_units(b)));
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(k, out);
                out.push(':');
                write_value(&map[*k], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn utf16_units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn write_number(n: &serde_json::Number, out: &mut String) -> Result<(), CanonicalError> {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
        return Ok(());
    }
    let f = n.as_f64().ok_or(CanonicalError::NonFiniteFloat)?;
    if !f.is_finite() {
        return Err(CanonicalError::NonFiniteFloat);
    }
    // `f64`'s Display already produces the shortest round-trip decimal.
    // JCS forbids a trailing ".0" on an integral float serialized as a
    // number; render whole floats with an explicit fractional digit only
    // when the source format requires it, otherwise match serde_json.
    let s = format!("{}", f);
    out.push_str(&s);
    Ok(())
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
