//! List Flattener: list-of-objects fields to delimited strings or child rows

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::extract::lookup;

/// Separator for flattened string values
pub const DELIMITER: &str = "; ";

/// A list-valued field read from a record.
///
/// Upstream stages sometimes stringify lists (a JSON array inside a string,
/// possibly quoted a second time); those are parsed and treated as lists.
#[derive(Debug, Clone, PartialEq)]
pub enum ListField<'a> {
    /// Missing key or JSON `null`
    Absent,
    Items(Cow<'a, [Value]>),
    /// Present but not a list (nor a string holding one)
    Malformed,
}

impl<'a> ListField<'a> {
    pub fn read(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::Array(items)) => Self::Items(Cow::Borrowed(items.as_slice())),
            Some(Value::String(text)) => match parse_list_text(text) {
                Some(items) => Self::Items(Cow::Owned(items)),
                None => Self::Malformed,
            },
            Some(_) => Self::Malformed,
        }
    }

    /// Read the list at `path` below `record`
    pub fn at(record: &'a Value, path: &[&str]) -> Self {
        Self::read(lookup(record, path))
    }

    /// Items of the list; empty when absent or malformed
    pub fn items(&self) -> &[Value] {
        match self {
            Self::Items(items) => items,
            Self::Absent | Self::Malformed => &[],
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed)
    }
}

/// Parse a list serialized as JSON text, including the doubly-quoted form
/// `"[{\"a\": 1}]"`. Returns `None` for any other string.
fn parse_list_text(text: &str) -> Option<Vec<Value>> {
    let text = text.trim();
    if text.len() >= 4 && text.starts_with("\"[") && text.ends_with("]\"") {
        let unescaped = text[1..text.len() - 1].replace("\\\"", "\"");
        if let Ok(Value::Array(items)) = serde_json::from_str(&unescaped) {
            return Some(items);
        }
    }
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(items),
        Value::String(inner) if inner.trim_start().starts_with('[') => {
            match serde_json::from_str::<Value>(&inner).ok()? {
                Value::Array(items) => Some(items),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Sort, de-duplicate and join string values with [`DELIMITER`].
///
/// Values are trimmed and empty ones dropped. A value that itself contains
/// the delimiter contributes each delimited piece, so re-splitting and
/// re-joining the output is a fixed point.
pub fn join_unique<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut set = BTreeSet::new();
    for value in values {
        for piece in value.as_ref().split(DELIMITER) {
            let piece = piece.trim();
            if !piece.is_empty() {
                set.insert(piece.to_string());
            }
        }
    }
    let mut out = String::new();
    for (i, value) in set.iter().enumerate() {
        if i > 0 {
            out.push_str(DELIMITER);
        }
        out.push_str(value);
    }
    out
}

/// Pull one sub-field from each object item and join the unique values.
///
/// Items that are not objects, or for which `key_fn` yields nothing, are
/// skipped. Output is independent of item order.
pub fn flatten_to_string<'v, F, S>(items: &'v [Value], mut key_fn: F) -> String
where
    F: FnMut(&'v Value) -> Option<S>,
    S: AsRef<str>,
{
    join_unique(
        items
            .iter()
            .filter(|item| item.is_object())
            .filter_map(|item| key_fn(item)),
    )
}

/// Join the string items of a list of scalars (`["US", "DE"]`)
pub fn flatten_strings(items: &[Value]) -> String {
    join_unique(items.iter().filter_map(Value::as_str))
}

/// Child rows produced from one list field of one record
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened<R> {
    pub rows: Vec<R>,
    /// Items dropped for not being objects or lacking required fields
    pub skipped_items: usize,
    /// The field itself was not a list
    pub malformed: bool,
}

impl<R> Default for Flattened<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped_items: 0,
            malformed: false,
        }
    }
}

impl<R> Flattened<R> {
    pub fn malformed() -> Self {
        Self {
            malformed: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Map each object item of `field` to zero or one row.
///
/// Non-object items and items for which `row_fn` returns `None` are counted
/// and skipped; siblings are unaffected.
pub fn flatten_to_rows<R, F>(field: &ListField<'_>, mut row_fn: F) -> Flattened<R>
where
    F: FnMut(&Value) -> Option<R>,
{
    if field.is_malformed() {
        return Flattened::malformed();
    }
    let mut out = Flattened::default();
    for item in field.items() {
        match item.is_object().then(|| row_fn(item)).flatten() {
            Some(row) => out.rows.push(row),
            None => out.skipped_items += 1,
        }
    }
    out
}

/// Non-empty trimmed string at `path` below `item`
pub fn str_at<'v>(item: &'v Value, path: &[&str]) -> Option<&'v str> {
    lookup(item, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
