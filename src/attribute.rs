//! Navigation of JSON attribute documents by [AttributeToken]s.
use serde_json::{Map, Value};

use crate::url::AttributeToken;

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn render(tokens: &[AttributeToken]) -> String {
    let mut s = String::new();
    for t in tokens {
        match t {
            AttributeToken::Key(k) => {
                s.push('/');
                s.push_str(k);
            }
            AttributeToken::Index(i) => s.push_str(&format!("[{i}]")),
        }
    }
    if s.is_empty() { "/".to_owned() } else { s }
}

fn mismatch(token: &AttributeToken, found: &Value) -> crate::Error {
    crate::Error::TypeMismatch {
        token: token.to_string(),
        found: kind(found),
    }
}

/// Walk `tokens` from `value`.
///
/// A missing key, an out-of-range index or a `null` on the way is [crate::Error::AttributeNotFound];
/// applying a token to a node of the wrong kind is [crate::Error::TypeMismatch].
pub fn get<'a>(value: &'a Value, tokens: &[AttributeToken]) -> crate::Result<&'a Value> {
    let mut current = value;
    for (depth, token) in tokens.iter().enumerate() {
        let next = match (token, current) {
            (_, Value::Null) => None,
            (AttributeToken::Key(k), Value::Object(map)) => map.get(k),
            (AttributeToken::Index(i), Value::Array(items)) => items.get(*i),
            (t, other) => return Err(mismatch(t, other)),
        };
        current = next
            .ok_or_else(|| crate::Error::AttributeNotFound(render(&tokens[..=depth])))?;
    }
    Ok(current)
}

/// Like [get], but an absent attribute is `None` rather than an error.
pub fn find<'a>(value: &'a Value, tokens: &[AttributeToken]) -> crate::Result<Option<&'a Value>> {
    match get(value, tokens) {
        Ok(v) => Ok(Some(v)),
        Err(crate::Error::AttributeNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn empty_container_for(token: &AttributeToken) -> Value {
    match token {
        AttributeToken::Key(_) => Value::Object(Map::new()),
        AttributeToken::Index(_) => Value::Array(Vec::new()),
    }
}

/// Set the node at `tokens` to `new`, creating intermediate nodes as needed.
///
/// Nodes of the wrong kind on the way are replaced; arrays are padded with `null`.
/// An empty token sequence replaces the whole document.
/// An index too large to pad up to is an error; indices past the addressable size
/// are rejected before anything is modified.
pub fn insert(value: &mut Value, tokens: &[AttributeToken], new: Value) -> crate::Result<()> {
    let Some((last, parents)) = tokens.split_last() else {
        *value = new;
        return Ok(());
    };
    check_indices(tokens)?;
    let mut current = value;
    for (i, token) in parents.iter().enumerate() {
        current = child_mut(current, token, &tokens[i + 1])?;
    }
    *slot_mut(current, last)? = new;
    Ok(())
}

/// Reject indices whose padded array length is not representable.
fn check_indices(tokens: &[AttributeToken]) -> crate::Result<()> {
    for token in tokens {
        if let AttributeToken::Index(i) = token {
            let len = i.checked_add(1).ok_or_else(|| too_large(*i))?;
            if len.checked_mul(size_of::<Value>()).is_none_or(|b| b > isize::MAX as usize) {
                return Err(too_large(*i));
            }
        }
    }
    Ok(())
}

fn too_large(index: usize) -> crate::Error {
    crate::Error::general(format!("array index [{index}] is too large to set"))
}

/// Mutable slot for `token` in `current`, converting `current` if it cannot hold it.
fn slot_mut<'a>(current: &'a mut Value, token: &AttributeToken) -> crate::Result<&'a mut Value> {
    let slot = match token {
        AttributeToken::Key(k) => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            let Value::Object(map) = current else {
                unreachable!("converted to an object above")
            };
            map.entry(k.clone()).or_insert(Value::Null)
        }
        AttributeToken::Index(i) => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            let Value::Array(items) = current else {
                unreachable!("converted to an array above")
            };
            if items.len() <= *i {
                let len = i.checked_add(1).ok_or_else(|| too_large(*i))?;
                items
                    .try_reserve(len - items.len())
                    .map_err(|_| too_large(*i))?;
                items.resize(len, Value::Null);
            }
            &mut items[*i]
        }
    };
    Ok(slot)
}

fn child_mut<'a>(
    current: &'a mut Value,
    token: &AttributeToken,
    next: &AttributeToken,
) -> crate::Result<&'a mut Value> {
    let child = slot_mut(current, token)?;
    let fits = matches!(
        (next, &*child),
        (AttributeToken::Key(_), Value::Object(_)) | (AttributeToken::Index(_), Value::Array(_))
    );
    if !fits {
        *child = empty_container_for(next);
    }
    Ok(child)
}

/// Remove and return the node at `tokens`, if present.
///
/// Removing an array element shifts the following elements down.
pub fn remove(value: &mut Value, tokens: &[AttributeToken]) -> crate::Result<Option<Value>> {
    let Some((last, parents)) = tokens.split_last() else {
        return Ok(Some(std::mem::take(value)));
    };
    let mut current = value;
    for token in parents {
        let next = match (token, current) {
            (AttributeToken::Key(k), Value::Object(map)) => map.get_mut(k),
            (AttributeToken::Index(i), Value::Array(items)) => items.get_mut(*i),
            (_, Value::Null) => None,
            (t, other) => return Err(mismatch(t, other)),
        };
        match next {
            Some(v) => current = v,
            None => return Ok(None),
        }
    }
    match (last, current) {
        (AttributeToken::Key(k), Value::Object(map)) => Ok(map.remove(k)),
        (AttributeToken::Index(i), Value::Array(items)) => {
            Ok((*i < items.len()).then(|| items.remove(*i)))
        }
        (_, Value::Null) => Ok(None),
        (t, other) => Err(mismatch(t, other)),
    }
}
