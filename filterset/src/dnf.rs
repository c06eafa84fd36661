use data_types::Attrs;

/// A single predicate: `key=value`, `key=*`, or `*=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Predicate {
    /// `key=value` — some attribute key matches (case-insensitively) and its
    /// value matches (case-insensitively).
    KeyValue { key: String, value: String },
    /// `key=*` — the given key exists.
    KeyExists { key: String },
    /// `*=value` — some attribute carries the given value.
    ValueExists { value: String },
}

impl Predicate {
    fn matches(&self, attrs: &Attrs) -> bool {
        match self {
            Predicate::KeyValue { key, value } => attrs
                .get(key)
                .map(|v| v.eq_ignore_ascii_case(value))
                .unwrap_or(false),
            Predicate::KeyExists { key } => attrs.contains_key(key),
            Predicate::ValueExists { value } => attrs.contains_value(value),
        }
    }
}

/// One conjunction: every positive predicate must match and no negative
/// predicate may match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Conjunction {
    pub(crate) positive: Vec<Predicate>,
    pub(crate) negative: Vec<Predicate>,
}

impl Conjunction {
    fn matches(&self, attrs: &Attrs) -> bool {
        self.positive.iter().all(|p| p.matches(attrs))
            && self.negative.iter().all(|p| !p.matches(attrs))
    }
}

/// A disjunction of conjunctions — the compiled form of a filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Dnf {
    pub(crate) disjuncts: Vec<Conjunction>,
}

impl Dnf {
    pub(crate) fn matches(&self, attrs: &Attrs) -> bool {
        self.disjuncts.iter().any(|c| c.matches(attrs))
    }
}
