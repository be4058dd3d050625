//! S-expression helpers shared by the control socket, the mapping store
//! and the landmark replay format.
//!
//! All three speak property lists (`(:key value :key value)`), parsed
//! with `lexpr`.

use lexpr::Value;

/// Escape a string for s-expression output.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render a boolean the way elisp reads it.
pub fn bool_sexp(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "nil"
    }
}

/// Whether a value is a keyword naming `key`.
/// Handles both `Value::Keyword("key")` (elisp parser) and
/// `Value::Symbol(":key")` (default parser) forms.
fn is_keyword(value: &Value, key: &str) -> bool {
    match value {
        Value::Keyword(k) => k.as_ref() == key,
        Value::Symbol(s) => s.strip_prefix(':') == Some(key),
        _ => false,
    }
}

/// Collect the elements of a proper list.  Returns None for an improper
/// list or a non-list value.  `()` and a bare `nil` are the empty list.
pub fn list_items(value: &Value) -> Option<Vec<&Value>> {
    let mut items = Vec::new();
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                items.push(pair.car());
                current = pair.cdr();
            }
            Value::Null | Value::Nil => return Some(items),
            Value::Symbol(s) if items.is_empty() && s.as_ref() == "nil" => return Some(items),
            _ => return None,
        }
    }
}

/// Find the value following `:key` in a property list.
pub fn plist_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                if is_keyword(pair.car(), key) {
                    // Value is the car of the next cons cell
                    return match pair.cdr() {
                        Value::Cons(next) => Some(next.car()),
                        _ => None,
                    };
                }
                current = pair.cdr();
            }
            _ => return None,
        }
    }
}

/// Render an atom as a plain string: keywords and symbols lose their
/// leading colon, strings are unquoted, numbers are formatted.
pub fn atom_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Keyword(v) => Some(v.to_string()),
        Value::Symbol(v) => Some(v.strip_prefix(':').unwrap_or(&**v).to_string()),
        Value::String(v) => Some(v.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(bool_sexp(*b).to_string()),
        Value::Nil => Some("nil".to_string()),
        _ => None,
    }
}

/// Extract a keyword value from an s-expression plist as a string.
pub fn get_keyword(value: &Value, key: &str) -> Option<String> {
    plist_get(value, key).and_then(atom_to_string)
}

/// Extract an integer value from an s-expression plist.
pub fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a floating-point value from an s-expression plist.
pub fn get_float(value: &Value, key: &str) -> Option<f64> {
    match plist_get(value, key)? {
        Value::Number(n) => n.as_f64(),
        other => atom_to_string(other).and_then(|s| s.parse().ok()),
    }
}

/// Extract a boolean value from an s-expression plist.
/// Treats "t" as true, "nil" as false.
pub fn get_bool(value: &Value, key: &str) -> Option<bool> {
    get_keyword(value, key).map(|s| s != "nil" && s != "#f")
}

/// Numeric value of an atom, if it is a number.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
