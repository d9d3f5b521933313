//! Field Extractor: declarative field paths over raw JSON records
//!
//! A source describes its publication attributes as a list of [`FieldSpec`]s
//! (output column, JSON path, expected kind, optional fallback). [`extract`]
//! interprets that list against one record and always returns a complete
//! [`FlatAttributes`] bag: a missing segment, a wrong container type or an
//! uncoercible leaf yields `Scalar::Null` for that column and nothing else.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

/// A flat attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

/// Type of a non-null [`Scalar`], also the declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Str,
    Int,
    Float,
    Bool,
    Date,
    Timestamp,
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Self::Null => None,
            Self::Str(_) => Some(ScalarType::Str),
            Self::Int(_) => Some(ScalarType::Int),
            Self::Float(_) => Some(ScalarType::Float),
            Self::Bool(_) => Some(ScalarType::Bool),
            Self::Date(_) => Some(ScalarType::Date),
            Self::Timestamp(_) => Some(ScalarType::Timestamp),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

/// Expected shape of the value at a field path and how to coerce it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Strings as-is; numbers and booleans stringified
    Str,
    /// Integral numbers or numeric strings
    Int,
    Float,
    /// Booleans, `true/false/t/f/1/0` strings, `0`/`1` numbers
    Bool,
    /// `YYYY-MM-DD` prefix of a string
    Date,
    /// ISO-8601 date-time; a bare date is midnight
    Timestamp,
    /// Calendar year of a date string, or an integral number
    YearOf,
    /// Last `/`-separated segment of an identifier URL
    ShortId,
    /// Arrays and objects as compact JSON text
    Json,
}

impl FieldKind {
    /// Column type this kind produces
    pub fn output_type(self) -> ScalarType {
        match self {
            Self::Str | Self::ShortId | Self::Json => ScalarType::Str,
            Self::Int | Self::YearOf => ScalarType::Int,
            Self::Float => ScalarType::Float,
            Self::Bool => ScalarType::Bool,
            Self::Date => ScalarType::Date,
            Self::Timestamp => ScalarType::Timestamp,
        }
    }

    /// Total coercion: anything that does not fit becomes `Scalar::Null`
    pub fn coerce(self, value: &Value) -> Scalar {
        let coerced = match self {
            Self::Str => match value {
                Value::String(s) => Some(Scalar::Str(s.clone())),
                Value::Number(n) => Some(Scalar::Str(n.to_string())),
                Value::Bool(b) => Some(Scalar::Str(b.to_string())),
                _ => None,
            },
            Self::Int => as_i64(value).map(Scalar::Int),
            Self::Float => as_f64(value).map(Scalar::Float),
            Self::Bool => as_bool(value).map(Scalar::Bool),
            Self::Date => value.as_str().and_then(parse_date).map(Scalar::Date),
            Self::Timestamp => value
                .as_str()
                .and_then(parse_timestamp)
                .map(Scalar::Timestamp),
            Self::YearOf => match value {
                Value::String(s) => parse_date(s)
                    .map(|d| i64::from(d.year()))
                    .or_else(|| parse_year(s)),
                other => as_i64(other),
            }
            .map(Scalar::Int),
            Self::ShortId => value
                .as_str()
                .and_then(short_id)
                .map(|id| Scalar::Str(id.to_string())),
            Self::Json => match value {
                Value::Null => None,
                Value::String(s) => Some(Scalar::Str(s.clone())),
                other => serde_json::to_string(other).ok().map(Scalar::Str),
            },
        };
        coerced.unwrap_or(Scalar::Null)
    }
}

/// Constant substituted when a field extracts to null
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    Str(&'static str),
    Int(i64),
    Bool(bool),
}

impl Fallback {
    pub fn to_scalar(self) -> Scalar {
        match self {
            Self::Str(s) => Scalar::Str(s.to_string()),
            Self::Int(n) => Scalar::Int(n),
            Self::Bool(b) => Scalar::Bool(b),
        }
    }

    pub fn scalar_type(self) -> ScalarType {
        match self {
            Self::Str(_) => ScalarType::Str,
            Self::Int(_) => ScalarType::Int,
            Self::Bool(_) => ScalarType::Bool,
        }
    }
}

/// One declarative field mapping: `column ← kind(record[path...])`
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub column: &'static str,
    pub path: &'static [&'static str],
    pub kind: FieldKind,
    pub fallback: Option<Fallback>,
}

impl FieldSpec {
    pub const fn new(column: &'static str, path: &'static [&'static str], kind: FieldKind) -> Self {
        Self {
            column,
            path,
            kind,
            fallback: None,
        }
    }

    /// Same mapping with a constant substituted for null
    pub const fn or(self, fallback: Fallback) -> Self {
        Self {
            fallback: Some(fallback),
            ..self
        }
    }

    /// Extract this field from a record; never fails
    pub fn extract(&self, record: &Value) -> Scalar {
        let value = lookup(record, self.path)
            .map(|v| self.kind.coerce(v))
            .unwrap_or(Scalar::Null);
        match (value, self.fallback) {
            (Scalar::Null, Some(fallback)) => fallback.to_scalar(),
            (value, _) => value,
        }
    }
}

/// A canonical attribute column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ScalarType,
}

impl ColumnDef {
    pub const fn new(name: &'static str, ty: ScalarType) -> Self {
        Self { name, ty }
    }
}

/// Flat attribute bag aligned to a fixed column layout
#[derive(Debug, Clone, PartialEq)]
pub struct FlatAttributes {
    columns: &'static [ColumnDef],
    values: Vec<Scalar>,
}

impl FlatAttributes {
    /// All-null bag for the given layout
    pub fn empty(columns: &'static [ColumnDef]) -> Self {
        Self {
            columns,
            values: vec![Scalar::Null; columns.len()],
        }
    }

    pub fn columns(&self) -> &'static [ColumnDef] {
        self.columns
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Scalar> {
        self.values
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Value of a column; `None` only for an unknown column name
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.index_of(name).map(|idx| &self.values[idx])
    }

    /// Set a column; returns false for an unknown column name
    pub fn set(&mut self, name: &str, value: Scalar) -> bool {
        let Some(idx) = self.index_of(name) else {
            return false;
        };
        debug_assert!(
            value.scalar_type().is_none_or(|ty| ty == self.columns[idx].ty),
            "type mismatch for column {name}"
        );
        self.values[idx] = value;
        true
    }

    /// (column, value) pairs in layout order
    pub fn iter(&self) -> impl Iterator<Item = (&'static ColumnDef, &Scalar)> {
        self.columns.iter().zip(self.values.iter())
    }
}

/// Walk `path` from `root`. Object segments are keys; a segment addressing an
/// array must be a decimal index. Missing segments, scalars in the middle of
/// the path and a JSON `null` leaf all give `None`.
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

/// Apply `specs` to `record`, producing a bag in the `columns` layout.
///
/// Several specs may target one column: the first non-null result wins, so
/// later specs act as alternates. Columns no spec targets stay null.
pub fn extract(record: &Value, specs: &[FieldSpec], columns: &'static [ColumnDef]) -> FlatAttributes {
    let mut attrs = FlatAttributes::empty(columns);
    for spec in specs {
        let Some(idx) = attrs.index_of(spec.column) else {
            continue;
        };
        if attrs.values[idx].is_null() {
            attrs.values[idx] = spec.extract(record);
        }
    }
    attrs
}

/// Problems with a spec list against a column layout (empty when compatible)
pub fn validate_specs(specs: &[FieldSpec], columns: &[ColumnDef]) -> Vec<String> {
    let mut problems = Vec::new();
    for spec in specs {
        let Some(column) = columns.iter().find(|c| c.name == spec.column) else {
            problems.push(format!("{}: no such column", spec.column));
            continue;
        };
        if spec.kind.output_type() != column.ty {
            problems.push(format!(
                "{}: {:?} produces {:?}, column is {:?}",
                spec.column,
                spec.kind,
                spec.kind.output_type(),
                column.ty
            ));
        }
        if let Some(fallback) = spec.fallback {
            if fallback.scalar_type() != column.ty {
                problems.push(format!("{}: fallback type mismatch", spec.column));
            }
        }
        if spec.path.is_empty() {
            problems.push(format!("{}: empty path", spec.column));
        }
    }
    problems
}

/// Last non-empty `/` segment: `https://openalex.org/A1` → `A1`
pub fn short_id(id: &str) -> Option<&str> {
    let id = id.trim().trim_end_matches('/');
    let tail = id.rsplit('/').next().unwrap_or(id);
    (!tail.is_empty()).then_some(tail)
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(x: f64) -> Option<i64> {
    (x.is_finite() && x.fract() == 0.0 && x.abs() < 9.0e15).then_some(x as i64)
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Some(true),
            "false" | "f" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let prefix = s.trim().get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn parse_year(s: &str) -> Option<i64> {
    let s = s.trim();
    (s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()))
        .then(|| s.parse().ok())
        .flatten()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    let local = s.strip_suffix('Z').unwrap_or(s);
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(local, format) {
            return Some(ts);
        }
    }
    if local.len() == 10 {
        return parse_date(local).map(|d| d.and_time(NaiveTime::MIN));
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    static COLUMNS: &[ColumnDef] = &[
        ColumnDef::new("title", ScalarType::Str),
        ColumnDef::new("year", ScalarType::Int),
        ColumnDef::new("source_name", ScalarType::Str),
        ColumnDef::new("status", ScalarType::Str),
        ColumnDef::new("unmapped", ScalarType::Float),
    ];

    static SPECS: &[FieldSpec] = &[
        FieldSpec::new("title", &["title"], FieldKind::Str),
        FieldSpec::new("year", &["publication_year"], FieldKind::Int),
        FieldSpec::new("year", &["publication_date"], FieldKind::YearOf),
        FieldSpec::new(
            "source_name",
            &["primary_location", "source", "display_name"],
            FieldKind::Str,
        ),
        FieldSpec::new("status", &["open_access", "oa_status"], FieldKind::Str)
            .or(Fallback::Str("unknown")),
    ];

    #[test]
    fn extracts_nested_paths() {
        let record = json!({
            "title": "A",
            "publication_year": 2021,
            "primary_location": {"source": {"display_name": "Nature"}},
            "open_access": {"oa_status": "gold"}
        });
        let attrs = extract(&record, SPECS, COLUMNS);
        assert_eq!(attrs.get("title"), Some(&Scalar::Str("A".into())));
        assert_eq!(attrs.get("year"), Some(&Scalar::Int(2021)));
        assert_eq!(attrs.get("source_name"), Some(&Scalar::Str("Nature".into())));
        assert_eq!(attrs.get("status"), Some(&Scalar::Str("gold".into())));
        assert_eq!(attrs.get("unmapped"), Some(&Scalar::Null));
        assert_eq!(attrs.get("nope"), None);
    }

    #[test]
    fn alternates_fill_nulls_in_order() {
        let record = json!({"publication_date": "2019-06-01"});
        let attrs = extract(&record, SPECS, COLUMNS);
        assert_eq!(attrs.get("year"), Some(&Scalar::Int(2019)));

        let record = json!({"publication_year": 2020, "publication_date": "2019-06-01"});
        let attrs = extract(&record, SPECS, COLUMNS);
        assert_eq!(attrs.get("year"), Some(&Scalar::Int(2020)));
    }

    #[test]
    fn short_circuits_on_wrong_containers() {
        for record in [
            json!({"primary_location": null}),
            json!({"primary_location": "string"}),
            json!({"primary_location": {"source": []}}),
            json!({"primary_location": {"source": {"display_name": {"x": 1}}}}),
            json!({"primary_location": [1, 2]}),
        ] {
            let attrs = extract(&record, SPECS, COLUMNS);
            assert_eq!(attrs.get("source_name"), Some(&Scalar::Null), "{record}");
        }
    }

    #[test]
    fn total_on_non_object_records() {
        for record in [json!(null), json!(42), json!("str"), json!([1, 2, 3])] {
            let attrs = extract(&record, SPECS, COLUMNS);
            assert_eq!(attrs.values().len(), COLUMNS.len());
            assert_eq!(attrs.get("status"), Some(&Scalar::Str("unknown".into())));
            assert_eq!(attrs.get("title"), Some(&Scalar::Null));
        }
    }

    #[test]
    fn lookup_indexes_arrays() {
        let record = json!({"links": [{"href": "a"}, {"href": "b"}]});
        assert_eq!(lookup(&record, &["links", "1", "href"]), Some(&json!("b")));
        assert_eq!(lookup(&record, &["links", "x", "href"]), None);
        assert_eq!(lookup(&record, &["links", "5"]), None);
    }

    #[test]
    fn coerce_str() {
        assert_eq!(FieldKind::Str.coerce(&json!(12)), Scalar::Str("12".into()));
        assert_eq!(FieldKind::Str.coerce(&json!(true)), Scalar::Str("true".into()));
        assert_eq!(FieldKind::Str.coerce(&json!([1])), Scalar::Null);
    }

    #[test]
    fn coerce_int() {
        assert_eq!(FieldKind::Int.coerce(&json!(7)), Scalar::Int(7));
        assert_eq!(FieldKind::Int.coerce(&json!(7.0)), Scalar::Int(7));
        assert_eq!(FieldKind::Int.coerce(&json!(" 42 ")), Scalar::Int(42));
        assert_eq!(FieldKind::Int.coerce(&json!("3.0")), Scalar::Int(3));
        assert_eq!(FieldKind::Int.coerce(&json!(7.5)), Scalar::Null);
        assert_eq!(FieldKind::Int.coerce(&json!("n/a")), Scalar::Null);
        assert_eq!(FieldKind::Int.coerce(&json!(true)), Scalar::Null);
    }

    #[test]
    fn coerce_float() {
        assert_eq!(FieldKind::Float.coerce(&json!(1.5)), Scalar::Float(1.5));
        assert_eq!(FieldKind::Float.coerce(&json!("2.25")), Scalar::Float(2.25));
        assert_eq!(FieldKind::Float.coerce(&json!("NaN")), Scalar::Null);
    }

    #[test]
    fn coerce_bool() {
        assert_eq!(FieldKind::Bool.coerce(&json!(true)), Scalar::Bool(true));
        assert_eq!(FieldKind::Bool.coerce(&json!("F")), Scalar::Bool(false));
        assert_eq!(FieldKind::Bool.coerce(&json!("true")), Scalar::Bool(true));
        assert_eq!(FieldKind::Bool.coerce(&json!(1)), Scalar::Bool(true));
        assert_eq!(FieldKind::Bool.coerce(&json!(2)), Scalar::Null);
        assert_eq!(FieldKind::Bool.coerce(&json!("maybe")), Scalar::Null);
    }

    #[test]
    fn coerce_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(FieldKind::Date.coerce(&json!("2024-03-05")), Scalar::Date(d));
        assert_eq!(
            FieldKind::Date.coerce(&json!("2024-03-05T10:00:00")),
            Scalar::Date(d)
        );
        assert_eq!(FieldKind::Date.coerce(&json!("2024-13-05")), Scalar::Null);
        assert_eq!(FieldKind::Date.coerce(&json!("2024")), Scalar::Null);
    }

    #[test]
    fn coerce_timestamps() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let expected = d.and_hms_micro_opt(3, 4, 5, 123_456).unwrap();
        assert_eq!(
            FieldKind::Timestamp.coerce(&json!("2025-01-15T03:04:05.123456")),
            Scalar::Timestamp(expected)
        );
        assert_eq!(
            FieldKind::Timestamp.coerce(&json!("2025-01-15T03:04:05.123456Z")),
            Scalar::Timestamp(expected)
        );
        assert_eq!(
            FieldKind::Timestamp.coerce(&json!("2025-01-15")),
            Scalar::Timestamp(d.and_time(NaiveTime::MIN))
        );
        assert_eq!(FieldKind::Timestamp.coerce(&json!("yesterday")), Scalar::Null);
    }

    #[test]
    fn coerce_year_of() {
        assert_eq!(FieldKind::YearOf.coerce(&json!("2018-07-01")), Scalar::Int(2018));
        assert_eq!(FieldKind::YearOf.coerce(&json!("2018")), Scalar::Int(2018));
        assert_eq!(FieldKind::YearOf.coerce(&json!(2018)), Scalar::Int(2018));
        assert_eq!(FieldKind::YearOf.coerce(&json!("July 2018")), Scalar::Null);
    }

    #[test]
    fn coerce_short_id_and_json() {
        assert_eq!(
            FieldKind::ShortId.coerce(&json!("https://openalex.org/W123")),
            Scalar::Str("W123".into())
        );
        assert_eq!(FieldKind::ShortId.coerce(&json!("I9")), Scalar::Str("I9".into()));
        assert_eq!(FieldKind::ShortId.coerce(&json!("")), Scalar::Null);
        assert_eq!(
            FieldKind::Json.coerce(&json!(["a", "b"])),
            Scalar::Str(r#"["a","b"]"#.into())
        );
    }

    #[test]
    fn set_rejects_unknown_column() {
        let mut attrs = FlatAttributes::empty(COLUMNS);
        assert!(attrs.set("title", Scalar::Str("x".into())));
        assert!(!attrs.set("nope", Scalar::Null));
        assert_eq!(attrs.get("title").and_then(Scalar::as_str), Some("x"));
    }

    #[test]
    fn validate_flags_bad_specs() {
        assert!(validate_specs(SPECS, COLUMNS).is_empty());
        let bad = [
            FieldSpec::new("missing", &["a"], FieldKind::Str),
            FieldSpec::new("year", &["a"], FieldKind::Str),
            FieldSpec::new("title", &["a"], FieldKind::Str).or(Fallback::Int(0)),
        ];
        assert_eq!(validate_specs(&bad, COLUMNS).len(), 3);
    }
}
