//! In-memory filtering of a fully scanned collection.
//!
//! Query-string parameters map onto a [`ListQuery`]:
//!
//! | param    | meaning                                               |
//! |----------|-------------------------------------------------------|
//! | `q`      | case-insensitive keyword over top-level strings       |
//! | `sort`   | field name, `-field` for descending                   |
//! | `limit`  | page size (default 50, max 500)                       |
//! | `offset` | records to skip                                       |
//! | other    | exact match on the top-level field of that name      |

use std::cmp::Ordering;
use std::collections::BTreeMap;

use openerp_core::{ListResult, ServiceError};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub limit: usize,
    pub offset: usize,
    pub filters: BTreeMap<String, String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            q: None,
            sort: None,
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
            filters: BTreeMap::new(),
        }
    }
}

impl ListQuery {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 500;

    pub fn from_params(params: BTreeMap<String, String>) -> Result<Self, ServiceError> {
        let mut query = Self::default();
        for (name, value) in params {
            match name.as_str() {
                "q" => query.q = Some(value).filter(|v| !v.trim().is_empty()),
                "sort" => query.sort = Some(value).filter(|v| !v.is_empty()),
                "limit" => query.limit = parse_count("limit", &value)?.min(Self::MAX_LIMIT),
                "offset" => query.offset = parse_count("offset", &value)?,
                _ => {
                    query.filters.insert(name, value);
                }
            }
        }
        Ok(query)
    }

    /// Shorthand for an exact-match filter.
    pub fn with_filter(mut self, field: &str, value: &str) -> Self {
        self.filters.insert(field.to_string(), value.to_string());
        self
    }

    /// Whether `doc` passes the keyword and every field filter.
    pub fn matches(&self, doc: &Value) -> bool {
        let filters_ok = self
            .filters
            .iter()
            .all(|(field, want)| doc.get(field).is_some_and(|v| scalar_matches(v, want)));
        filters_ok && self.q.as_deref().is_none_or(|q| keyword_matches(doc, q))
    }

    /// Filter, sort and paginate. `docs` pairs each record with its JSON form.
    pub fn apply<T: serde::Serialize>(&self, docs: Vec<(T, Value)>) -> ListResult<T> {
        let mut hits: Vec<(T, Value)> = docs.into_iter().filter(|(_, v)| self.matches(v)).collect();

        if let Some(sort) = &self.sort {
            let (field, descending) = match sort.strip_prefix('-') {
                Some(field) => (field, true),
                None => (sort.as_str(), false),
            };
            hits.sort_by(|(_, a), (_, b)| compare_field(a.get(field), b.get(field), descending));
        }

        let total = hits.len();
        let items: Vec<T> = hits
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .map(|(record, _)| record)
            .collect();
        let has_more = self.offset.saturating_add(items.len()) < total;
        ListResult {
            items,
            total,
            has_more,
        }
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize, ServiceError> {
    value.parse().map_err(|_| {
        ServiceError::Validation(format!("{} must be a non-negative integer, got '{}'", name, value))
    })
}

fn scalar_matches(value: &Value, want: &str) -> bool {
    match value {
        Value::String(s) => s == want,
        Value::Bool(b) => b.to_string() == want,
        Value::Number(n) => n.to_string() == want,
        Value::Array(items) => items.iter().any(|item| scalar_matches(item, want)),
        Value::Null | Value::Object(_) => false,
    }
}

fn keyword_matches(doc: &Value, q: &str) -> bool {
    let needle = q.trim().to_lowercase();
    let Some(obj) = doc.as_object() else {
        return false;
    };
    let hit = |v: &Value| v.as_str().is_some_and(|s| s.to_lowercase().contains(&needle));
    obj.values().any(|v| match v {
        Value::Array(items) => items.iter().any(hit),
        other => hit(other),
    })
}

// Missing and null values sort last in both directions.
fn compare_field(a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = compare_values(a, b);
            if descending { ord.reverse() } else { ord }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn docs() -> Vec<(String, Value)> {
        [
            json!({"code": "PS-00001", "name": "Hex Bolt M6", "status": "active", "tags": ["fastener"], "qty": 10}),
            json!({"code": "PS-00002", "name": "Washer", "status": "inactive", "tags": [], "qty": 2}),
            json!({"code": "PS-00003", "name": "Hex Nut M6", "status": "active", "tags": ["fastener", "nut"]}),
        ]
        .into_iter()
        .map(|v| (v["code"].as_str().unwrap().to_string(), v))
        .collect()
    }

    fn codes(result: &ListResult<String>) -> Vec<&str> {
        result.items.iter().map(String::as_str).collect()
    }

    #[test]
    fn defaults_and_limit_cap() {
        let q = ListQuery::from_params(BTreeMap::new()).unwrap();
        assert_eq!(q.limit, 50);
        assert_eq!(q.offset, 0);

        let q = ListQuery::from_params(params(&[("limit", "10000")])).unwrap();
        assert_eq!(q.limit, 500);

        assert!(ListQuery::from_params(params(&[("offset", "-1")])).is_err());
    }

    #[test]
    fn keyword_is_case_insensitive_and_searches_arrays() {
        let q = ListQuery::from_params(params(&[("q", "HEX")])).unwrap();
        assert_eq!(codes(&q.apply(docs())), vec!["PS-00001", "PS-00003"]);

        let q = ListQuery::from_params(params(&[("q", "nut")])).unwrap();
        assert_eq!(codes(&q.apply(docs())), vec!["PS-00003"]);
    }

    #[test]
    fn exact_filters() {
        let q = ListQuery::from_params(params(&[("status", "active"), ("tags", "nut")])).unwrap();
        assert_eq!(codes(&q.apply(docs())), vec!["PS-00003"]);

        let q = ListQuery::default().with_filter("qty", "2");
        assert_eq!(codes(&q.apply(docs())), vec!["PS-00002"]);

        // Prefix of a value is not a match.
        let q = ListQuery::default().with_filter("status", "act");
        assert!(q.apply(docs()).items.is_empty());
    }

    #[test]
    fn sort_numeric_with_missing_last() {
        let q = ListQuery::from_params(params(&[("sort", "qty")])).unwrap();
        assert_eq!(codes(&q.apply(docs())), vec!["PS-00002", "PS-00001", "PS-00003"]);

        let q = ListQuery::from_params(params(&[("sort", "-qty")])).unwrap();
        assert_eq!(codes(&q.apply(docs())), vec!["PS-00001", "PS-00002", "PS-00003"]);
    }

    #[test]
    fn pagination_reports_total_and_has_more() {
        let q = ListQuery::from_params(params(&[("limit", "2")])).unwrap();
        let page = q.apply(docs());
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more);

        let q = ListQuery::from_params(params(&[("limit", "2"), ("offset", "2")])).unwrap();
        let page = q.apply(docs());
        assert_eq!(codes(&page), vec!["PS-00003"]);
        assert!(!page.has_more);

        let q = ListQuery::from_params(params(&[("offset", "99")])).unwrap();
        let page = q.apply(docs());
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }
}
