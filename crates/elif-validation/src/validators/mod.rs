//! Built-in validators

pub mod array;
pub mod basic;
pub mod compare;
pub mod custom;
pub mod date;
pub mod email;
pub mod multi;
pub mod number;
pub mod object;
pub mod presence;
pub mod range;
pub mod string;
pub mod url;

pub use array::ArrayValidator;
pub use basic::{SafeValidator, UnsafeValidator};
pub use compare::{CompareOperator, CompareValidator};
pub use custom::CustomValidator;
pub use date::DateValidator;
pub use email::EmailValidator;
pub use multi::MultiValidator;
pub use number::NumberValidator;
pub use object::ObjectValidator;
pub use presence::PresenceValidator;
pub use range::RangeValidator;
pub use string::StringValidator;
pub use url::UrlValidator;

use serde_json::Value;
use std::collections::BTreeMap;

/// Null, whitespace-only strings, and empty arrays or objects are empty.
/// Numbers and booleans never are.
pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Template lookup shared by validators with several failure modes: an
/// override registered under `code`, or the built-in default.
pub(crate) fn template<'a>(
    overrides: &'a BTreeMap<String, String>,
    code: &str,
    default: &'a str,
) -> &'a str {
    overrides.get(code).map(String::as_str).unwrap_or(default)
}
