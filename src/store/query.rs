//! Filter model shared by all store implementations.
//!
//! A [`Query`] is a set of required conditions plus an optional list of
//! alternative AND-groups:
//!
//! ```text
//! required_1 AND required_2 AND ((group_1) OR (group_2) OR ...)
//! ```
//!
//! This is enough to express the symmetric pair lookup
//! `(requester = A AND receiver = B) OR (requester = B AND receiver = A)`.

use std::cmp::Ordering;

use serde_json::Value;

use super::schema::Collection;

/// A stored record: column name to value.
pub type Record = serde_json::Map<String, Value>;

/// A single filter on one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Column equals the value.
    Eq(&'static str, Value),
    /// Column matches a case-insensitive `LIKE` pattern (`%` and `_` wildcards).
    ILike(&'static str, String),
    /// Column equals one of the values. An empty list matches nothing.
    In(&'static str, Vec<Value>),
}

impl Condition {
    /// Equality condition.
    #[must_use]
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self::Eq(column, value.into())
    }

    /// Case-insensitive pattern condition.
    #[must_use]
    pub fn ilike(column: &'static str, pattern: impl Into<String>) -> Self {
        Self::ILike(column, pattern.into())
    }

    /// Membership condition.
    #[must_use]
    pub fn is_in<V: Into<Value>>(column: &'static str, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(column, values.into_iter().map(Into::into).collect())
    }

    /// The column this condition filters on.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Eq(column, _) | Self::ILike(column, _) | Self::In(column, _) => column,
        }
    }

    /// Evaluates the condition against a record.
    ///
    /// A missing column behaves like `NULL`, which never matches.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.get(self.column()).filter(|v| !v.is_null()) else {
            return false;
        };
        match self {
            Self::Eq(_, expected) => actual == expected,
            Self::ILike(_, pattern) => actual
                .as_str()
                .is_some_and(|text| like_matches(pattern, text)),
            Self::In(_, values) => values.iter().any(|v| v == actual),
        }
    }
}

/// A filtered read against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: Collection,
    required: Vec<Condition>,
    any_of: Vec<Vec<Condition>>,
    order_by: Option<&'static str>,
}

impl Query {
    /// Creates a query matching every record of `collection`.
    #[must_use]
    pub const fn new(collection: Collection) -> Self {
        Self {
            collection,
            required: Vec::new(),
            any_of: Vec::new(),
            order_by: None,
        }
    }

    /// Adds a condition every match must satisfy.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.required.push(condition);
        self
    }

    /// Adds an alternative AND-group. A record must satisfy at least one
    /// group once any group has been added.
    #[must_use]
    pub fn or_where(mut self, group: impl IntoIterator<Item = Condition>) -> Self {
        self.any_of.push(group.into_iter().collect());
        self
    }

    /// Orders results ascending by `column`, ties broken by the key column.
    #[must_use]
    pub const fn order_by(mut self, column: &'static str) -> Self {
        self.order_by = Some(column);
        self
    }

    /// The collection this query reads.
    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// Conditions every match must satisfy.
    #[must_use]
    pub fn required(&self) -> &[Condition] {
        &self.required
    }

    /// Alternative AND-groups.
    #[must_use]
    pub fn any_of(&self) -> &[Vec<Condition>] {
        &self.any_of
    }

    /// Ordering column, if any.
    #[must_use]
    pub const fn ordering(&self) -> Option<&'static str> {
        self.order_by
    }

    /// Every column referenced by the query.
    pub fn referenced_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.required
            .iter()
            .chain(self.any_of.iter().flatten())
            .map(Condition::column)
            .chain(self.order_by)
    }

    /// Evaluates the query's filters against a record.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.required.iter().all(|c| c.matches(record))
            && (self.any_of.is_empty()
                || self
                    .any_of
                    .iter()
                    .any(|group| group.iter().all(|c| c.matches(record))))
    }

    /// Sort order used by [`Query::order_by`]: ordering column, then key.
    #[must_use]
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let key = self.collection.key_column();
        let by_order = self.order_by.map_or(Ordering::Equal, |column| {
            compare_values(a.get(column), b.get(column))
        });
        by_order.then_with(|| compare_values(a.get(key), b.get(key)))
    }
}

/// Orders values the way `SQLite` does: `NULL` first, then numbers, then text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_) | Value::Bool(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(_) => 3,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// `LIKE` matching with ASCII case folding, as `SQLite` does by default.
fn like_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    // Greedy wildcard matching with backtracking to the last `%`.
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p).copied() {
            Some('%') => {
                star = Some((p, t));
                p += 1;
            }
            Some(c) if c == '_' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test records are objects"),
        }
    }

    #[test]
    fn eq_matches_exact_value() {
        let row = record(json!({"status": "pending"}));
        assert!(Condition::eq("status", "pending").matches(&row));
        assert!(!Condition::eq("status", "accepted").matches(&row));
    }

    #[test]
    fn missing_or_null_column_never_matches() {
        let row = record(json!({"responded_at": null}));
        assert!(!Condition::eq("responded_at", Value::Null).matches(&row));
        assert!(!Condition::eq("status", "pending").matches(&row));
    }

    #[test]
    fn in_matches_any_listed_value() {
        let row = record(json!({"status": "accepted"}));
        assert!(Condition::is_in("status", ["pending", "accepted"]).matches(&row));
        assert!(!Condition::is_in("status", ["declined"]).matches(&row));
        assert!(!Condition::is_in("status", Vec::<String>::new()).matches(&row));
    }

    #[test]
    fn ilike_is_case_insensitive() {
        let row = record(json!({"email": "Alice@Example.com"}));
        assert!(Condition::ilike("email", "alice@example.com").matches(&row));
        assert!(Condition::ilike("email", "%@EXAMPLE.COM").matches(&row));
        assert!(Condition::ilike("email", "a_ice%").matches(&row));
        assert!(!Condition::ilike("email", "bob%").matches(&row));
    }

    #[test]
    fn like_wildcards() {
        assert!(like_matches("%", ""));
        assert!(like_matches("a%c", "abbbc"));
        assert!(like_matches("%b%", "abc"));
        assert!(!like_matches("a_c", "ac"));
        assert!(!like_matches("abc", "abcd"));
        assert!(like_matches("%%c", "abc"));
    }

    #[test]
    fn or_groups_express_symmetric_pair() {
        let query = Query::new(Collection::Friendships)
            .filter(Condition::eq("status", "accepted"))
            .or_where([
                Condition::eq("requester_id", "a"),
                Condition::eq("receiver_id", "b"),
            ])
            .or_where([
                Condition::eq("requester_id", "b"),
                Condition::eq("receiver_id", "a"),
            ]);

        let forward = record(json!({"requester_id": "a", "receiver_id": "b", "status": "accepted"}));
        let reverse = record(json!({"requester_id": "b", "receiver_id": "a", "status": "accepted"}));
        let other = record(json!({"requester_id": "a", "receiver_id": "c", "status": "accepted"}));
        let pending = record(json!({"requester_id": "a", "receiver_id": "b", "status": "pending"}));

        assert!(query.matches(&forward));
        assert!(query.matches(&reverse));
        assert!(!query.matches(&other));
        assert!(!query.matches(&pending));
    }

    #[test]
    fn empty_query_matches_everything() {
        let query = Query::new(Collection::Users);
        assert!(query.matches(&Record::new()));
    }

    #[test]
    fn referenced_columns_lists_all() {
        let query = Query::new(Collection::Friendships)
            .filter(Condition::eq("status", "pending"))
            .or_where([Condition::eq("receiver_id", "u")])
            .order_by("created_at");
        let columns: Vec<_> = query.referenced_columns().collect();
        assert_eq!(columns, vec!["status", "receiver_id", "created_at"]);
    }

    #[test]
    fn compare_orders_by_column_then_key() {
        let query = Query::new(Collection::Friendships).order_by("created_at");
        let early = record(json!({"id": "z", "created_at": 1}));
        let late_a = record(json!({"id": "a", "created_at": 2}));
        let late_b = record(json!({"id": "b", "created_at": 2}));

        assert_eq!(query.compare(&early, &late_a), Ordering::Less);
        assert_eq!(query.compare(&late_a, &late_b), Ordering::Less);
        assert_eq!(query.compare(&late_b, &late_b), Ordering::Equal);
    }

    #[test]
    fn null_sorts_first() {
        assert_eq!(
            compare_values(None, Some(&json!(0))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(Some(&json!(5)), Some(&json!("text"))),
            Ordering::Less
        );
    }
}
