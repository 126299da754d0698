use clawnet_core::error::ClawError;
use serde_json::Value;

pub fn field<'a>(payload: &'a Value, name: &'static str) -> Result<&'a Value, ClawError> {
    payload.get(name).ok_or(ClawError::MissingField(name))
}

pub fn str_field<'a>(payload: &'a Value, name: &'static str) -> Result<&'a str, ClawError> {
    field(payload, name)?.as_str().ok_or(ClawError::TypeMismatch(name))
}

pub fn u128_field(payload: &Value, name: &'static str) -> Result<u128, ClawError> {
    let v = field(payload, name)?;
    if let Some(s) = v.as_str() {
        // Large balances travel as strings to survive JSON's f64 number
        // ceiling; both forms are accepted.
        return s.parse().map_err(|_| ClawError::TypeMismatch(name));
    }
    v.as_u64().map(|n| n as u128).ok_or(ClawError::TypeMismatch(name))
}

pub fn i64_field(payload: &Value, name: &'static str) -> Result<i64, ClawError> {
    field(payload, name)?.as_i64().ok_or(ClawError::TypeMismatch(name))
}

pub fn opt_str_field<'a>(payload: &'a Value, name: &'static str) -> Option<&'a str> {
    payload.get(name).and_then(|v| v.as_str())
}
