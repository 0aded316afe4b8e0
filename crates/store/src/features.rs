//! Query-string → structured query translation.
//!
//! Given the raw query parameters of a list request, builds four independent,
//! chainable stages over a collection of JSON documents:
//!
//! - filter: everything except the reserved control keys (`page`, `sort`,
//!   `limit`, `fields`); `field[gte|gt|lte|lt]=v` becomes a comparison
//!   predicate, anything else an equality predicate
//! - sort: comma-separated field list, `-` prefix for descending; defaults
//!   to newest-first (`-created_at`)
//! - projection: comma-separated allow-list of fields to return
//! - pagination: `page`/`limit` with skip = (page-1)*limit
//!
//! The stages compose in any order; [`QueryFeatures::from_params`] applies
//! the canonical filter → sort → project → paginate order.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;

/// Keys that drive the builder itself and never become filter predicates.
const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 100;

/// Comparison operator of a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Cmp {
    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }
}

/// One filter predicate against a document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub cmp: Cmp,
    pub value: Value,
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            cmp: Cmp::Eq,
            value,
        }
    }

    /// Whether a document satisfies this predicate.
    ///
    /// A missing field never matches. Values of different JSON kinds never
    /// match either, except that query-string scalars were already coerced
    /// (numeric/bool-looking strings became numbers/bools).
    pub fn matches(&self, doc: &Value) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        match compare_values(actual, &self.value) {
            Some(ord) => match self.cmp {
                Cmp::Eq => ord == Ordering::Equal,
                Cmp::Gt => ord == Ordering::Greater,
                Cmp::Gte => ord != Ordering::Less,
                Cmp::Lt => ord == Ordering::Less,
                Cmp::Lte => ord != Ordering::Greater,
            },
            None => false,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One sort key; earlier keys take precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                order: SortOrder::Desc,
            },
            None => Self {
                field: raw.to_string(),
                order: SortOrder::Asc,
            },
        }
    }
}

/// The structured query produced from a request's query string.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFeatures {
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortKey>,
    pub fields: Option<Vec<String>>,
    pub page: usize,
    pub limit: usize,
}

impl Default for QueryFeatures {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
            sort: vec![SortKey {
                field: "created_at".to_string(),
                order: SortOrder::Desc,
            }],
            fields: None,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl QueryFeatures {
    /// Build all four stages from raw query parameters in canonical order.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self::default()
            .filter(params)
            .sort_by(params)
            .project(params)
            .paginate(params)
    }

    /// Filter stage: everything that is not a reserved control key.
    pub fn filter(mut self, params: &HashMap<String, String>) -> Self {
        for (key, raw) in params {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let (field, cmp) = parse_filter_key(key);
            self.predicates.push(Predicate {
                field,
                cmp,
                value: coerce_scalar(raw),
            });
        }
        self
    }

    /// Sort stage: `sort=-price,name`; unspecified keeps the newest-first default.
    pub fn sort_by(mut self, params: &HashMap<String, String>) -> Self {
        if let Some(spec) = params.get("sort") {
            let keys: Vec<SortKey> = spec
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(SortKey::parse)
                .collect();
            if !keys.is_empty() {
                self.sort = keys;
            }
        }
        self
    }

    /// Projection stage: `fields=name,price`; `id` is always kept.
    pub fn project(mut self, params: &HashMap<String, String>) -> Self {
        if let Some(spec) = params.get("fields") {
            let fields: Vec<String> = spec
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !fields.is_empty() {
                self.fields = Some(fields);
            }
        }
        self
    }

    /// Pagination stage: `page` (min 1) and `limit`.
    pub fn paginate(mut self, params: &HashMap<String, String>) -> Self {
        if let Some(page) = params.get("page").and_then(|v| v.parse::<usize>().ok()) {
            self.page = page.max(1);
        }
        if let Some(limit) = params.get("limit").and_then(|v| v.parse::<usize>().ok()) {
            if limit > 0 {
                self.limit = limit;
            }
        }
        self
    }

    /// Run the full pipeline over a set of documents.
    ///
    /// A page past the end of the data yields an empty result, not an error.
    pub fn apply(&self, mut docs: Vec<Value>) -> Vec<Value> {
        docs.retain(|doc| self.predicates.iter().all(|p| p.matches(doc)));

        docs.sort_by(|a, b| {
            for key in &self.sort {
                let ord = compare_fields(a, b, &key.field);
                let ord = match key.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        if let Some(fields) = &self.fields {
            docs = docs.into_iter().map(|doc| project_doc(doc, fields)).collect();
        }

        let skip = (self.page - 1).saturating_mul(self.limit);
        docs.into_iter().skip(skip).take(self.limit).collect()
    }
}

/// Splits `price[gte]` into (`price`, `Gte`); plain keys are equality.
///
/// An unrecognized bracket operator is kept verbatim as an equality key, which
/// simply matches nothing.
fn parse_filter_key(key: &str) -> (String, Cmp) {
    if let Some(rest) = key.strip_suffix(']') {
        if let Some((field, op)) = rest.split_once('[') {
            if let Some(cmp) = Cmp::from_suffix(op) {
                return (field.to_string(), cmp);
            }
        }
    }
    (key.to_string(), Cmp::Eq)
}

/// Query-string values are untyped; numbers and bools are coerced so they
/// compare against the documents' native JSON types.
fn coerce_scalar(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn compare_fields(a: &Value, b: &Value, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Total-ish ordering over the JSON scalars we query on.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn project_doc(doc: Value, fields: &[String]) -> Value {
    let Value::Object(map) = doc else {
        return doc;
    };
    let kept = map
        .into_iter()
        .filter(|(k, _)| k == "id" || fields.iter().any(|f| f == k))
        .collect();
    Value::Object(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn docs() -> Vec<Value> {
        vec![
            json!({"id": "a", "name": "Forest Hiker", "price": 497, "difficulty": "easy", "created_at": "2024-01-01T00:00:00Z"}),
            json!({"id": "b", "name": "Sea Explorer", "price": 997, "difficulty": "medium", "created_at": "2024-03-01T00:00:00Z"}),
            json!({"id": "c", "name": "Snow Adventurer", "price": 1497, "difficulty": "difficult", "created_at": "2024-02-01T00:00:00Z"}),
        ]
    }

    #[test]
    fn reserved_keys_are_not_filters() {
        let f = QueryFeatures::from_params(&params(&[
            ("page", "2"),
            ("sort", "price"),
            ("limit", "10"),
            ("fields", "name"),
        ]));
        assert!(f.predicates.is_empty());
    }

    #[test]
    fn equality_and_comparison_filters() {
        let f = QueryFeatures::from_params(&params(&[
            ("difficulty", "easy"),
            ("price[lte]", "500"),
        ]));
        let out = f.apply(docs());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], "a");
    }

    #[test]
    fn gte_filter_is_inclusive() {
        let f = QueryFeatures::from_params(&params(&[("price[gte]", "997")]));
        let out = f.apply(docs());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn sort_descending_by_price() {
        let f = QueryFeatures::from_params(&params(&[("sort", "-price")]));
        let out = f.apply(docs());
        let ids: Vec<_> = out.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
    }

    #[test]
    fn default_sort_is_newest_first() {
        let f = QueryFeatures::from_params(&HashMap::new());
        let out = f.apply(docs());
        let ids: Vec<_> = out.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn projection_keeps_id_and_listed_fields() {
        let f = QueryFeatures::from_params(&params(&[("fields", "name,price")]));
        let out = f.apply(docs());
        let obj = out[0].as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["id", "name", "price"]);
    }

    #[test]
    fn pagination_returns_requested_window() {
        let f = QueryFeatures::from_params(&params(&[
            ("sort", "-price"),
            ("limit", "2"),
            ("page", "1"),
        ]));
        let out = f.apply(docs());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], "c");
        assert_eq!(out[1]["id"], "b");
    }

    #[test]
    fn page_past_the_end_is_empty_not_an_error() {
        let f = QueryFeatures::from_params(&params(&[("limit", "2"), ("page", "50")]));
        assert!(f.apply(docs()).is_empty());
    }

    #[test]
    fn stages_compose_in_any_order() {
        let p = params(&[("sort", "-price"), ("limit", "1"), ("difficulty", "medium")]);
        let canonical = QueryFeatures::from_params(&p);
        let shuffled = QueryFeatures::default()
            .paginate(&p)
            .project(&p)
            .filter(&p)
            .sort_by(&p);
        assert_eq!(canonical, shuffled);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn apply_respects_limit_and_never_panics(
                page in 0usize..10_000,
                limit in 1usize..500,
                prices in proptest::collection::vec(0i64..100_000, 0..64),
            ) {
                let docs: Vec<Value> = prices
                    .iter()
                    .enumerate()
                    .map(|(i, p)| json!({"id": i.to_string(), "price": p}))
                    .collect();
                let f = QueryFeatures::from_params(&params(&[
                    ("page", &page.to_string()),
                    ("limit", &limit.to_string()),
                    ("sort", "price"),
                ]));
                let out = f.apply(docs);
                prop_assert!(out.len() <= limit);
            }
        }
    }
}
