//! Compiles per-vault filter expressions into disjunctive-normal-form
//! predicate trees and evaluates them against ingested attributes, deciding
//! which vaults a record should fan out to.

#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

mod dnf;
mod error;
mod parser;

pub use error::FilterError;

use data_types::Attrs;
use dnf::Dnf;
use std::collections::BTreeMap;
use uuid::Uuid;

/// How a single vault's destination rule was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    /// `""` — the vault receives nothing; a permanently disabled route.
    None,
    /// `"*"` — the vault receives every record unconditionally.
    CatchAll,
    /// `"+"` — the vault receives a record only if no `Expr` filter matched it.
    CatchRest,
    /// A compiled boolean expression over attributes.
    Expr,
}

/// A compiled per-vault routing rule.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub vault_id: Uuid,
    /// Empty for a local destination, non-empty for a remote one.
    pub node_id: Option<String>,
    pub kind: FilterKind,
    /// Original source text, retained for round-tripping/diagnostics.
    pub expr: String,
    dnf: Option<Dnf>,
}

impl CompiledFilter {
    /// Compiles `expr` into a filter for `vault_id`. `node_id` is `None` for
    /// a local destination.
    pub fn compile(
        vault_id: Uuid,
        node_id: Option<String>,
        expr: &str,
    ) -> Result<Self, FilterError> {
        let trimmed = expr.trim();
        let (kind, dnf) = match trimmed {
            "" => (FilterKind::None, None),
            "*" => (FilterKind::CatchAll, None),
            "+" => (FilterKind::CatchRest, None),
            _ => (FilterKind::Expr, Some(parser::parse(trimmed)?)),
        };
        Ok(Self {
            vault_id,
            node_id,
            kind,
            expr: expr.to_string(),
            dnf,
        })
    }

    fn matches(&self, attrs: &Attrs) -> bool {
        match self.kind {
            FilterKind::None | FilterKind::CatchRest => false,
            FilterKind::CatchAll => true,
            FilterKind::Expr => self
                .dnf
                .as_ref()
                .expect("Expr filter always carries a compiled DNF")
                .matches(attrs),
        }
    }
}

/// An ordered, immutable collection of [`CompiledFilter`]s, at most one per
/// vault ID. Rebuilt via copy-and-swap: every mutating method returns a new
/// `FilterSet`, leaving the receiver untouched, so a writer can publish a
/// new set by swapping a single pointer while readers keep working off
/// their already-borrowed snapshot.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: BTreeMap<Uuid, CompiledFilter>,
    // Preserves declaration order for evaluation pass one/two (§4.4).
    order: Vec<Uuid>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns a new set with `filter` inserted or replacing any existing
    /// entry for the same vault ID.
    pub fn add_or_update(&self, filter: CompiledFilter) -> Self {
        let mut next = self.clone();
        if !next.filters.contains_key(&filter.vault_id) {
            next.order.push(filter.vault_id);
        }
        next.filters.insert(filter.vault_id, filter);
        next
    }

    /// Returns a new set with the given vault IDs removed, or `None` if the
    /// result would be empty.
    pub fn without(&self, ids: &[Uuid]) -> Option<Self> {
        let mut next = self.clone();
        for id in ids {
            next.filters.remove(id);
        }
        next.order.retain(|id| next.filters.contains_key(id));
        if next.filters.is_empty() {
            None
        } else {
            Some(next)
        }
    }

    /// Evaluates the set against `attrs`, returning every local vault ID
    /// that should receive the record. See §4.4: catch-all matches do not
    /// inhibit catch-rest — only an `Expr` match does.
    pub fn matching_vaults(&self, attrs: &Attrs) -> Vec<Uuid> {
        self.matches_with_node(attrs)
            .into_iter()
            .filter(|(_, node_id)| node_id.is_none())
            .map(|(vault_id, _)| vault_id)
            .collect()
    }

    /// Same as [`Self::matching_vaults`] but also returns each destination's
    /// node ID, so the dispatcher can split local delivery from forwarding.
    pub fn matches_with_node(&self, attrs: &Attrs) -> Vec<(Uuid, Option<String>)> {
        let mut any_expr_matched = false;
        let mut hits = Vec::new();
        let mut catch_rest = Vec::new();

        for id in &self.order {
            let filter = &self.filters[id];
            match filter.kind {
                FilterKind::None => {}
                FilterKind::CatchAll => hits.push((filter.vault_id, filter.node_id.clone())),
                FilterKind::CatchRest => catch_rest.push((filter.vault_id, filter.node_id.clone())),
                FilterKind::Expr => {
                    if filter.matches(attrs) {
                        any_expr_matched = true;
                        hits.push((filter.vault_id, filter.node_id.clone()));
                    }
                }
            }
        }

        if !any_expr_matched {
            hits.extend(catch_rest);
        }

        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn attrs(pairs: &[(&str, &str)]) -> Attrs {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn build_set() -> FilterSet {
        let mut set = FilterSet::new();
        set = set.add_or_update(
            CompiledFilter::compile(vault(1), None, "env=prod AND level=error").unwrap(),
        );
        set = set.add_or_update(CompiledFilter::compile(vault(2), None, "env=staging").unwrap());
        set = set.add_or_update(CompiledFilter::compile(vault(3), None, "*").unwrap());
        set = set.add_or_update(CompiledFilter::compile(vault(4), None, "+").unwrap());
        set = set.add_or_update(CompiledFilter::compile(vault(5), None, "").unwrap());
        set
    }

    #[test]
    fn fan_out_matches_spec_table() {
        let set = build_set();

        let mut got = set.matching_vaults(&attrs(&[("env", "prod"), ("level", "error")]));
        got.sort();
        assert_eq!(got, vec![vault(1), vault(3)]);

        let mut got = set.matching_vaults(&attrs(&[("env", "prod"), ("level", "info")]));
        got.sort();
        assert_eq!(got, vec![vault(3), vault(4)]);

        let mut got = set.matching_vaults(&attrs(&[("env", "staging"), ("level", "debug")]));
        got.sort();
        assert_eq!(got, vec![vault(2), vault(3)]);

        let mut got = set.matching_vaults(&attrs(&[("env", "unknown")]));
        got.sort();
        assert_eq!(got, vec![vault(3), vault(4)]);

        let mut got = set.matching_vaults(&attrs(&[]));
        got.sort();
        assert_eq!(got, vec![vault(3), vault(4)]);
    }

    #[test]
    fn case_insensitive_and_not_and_exists_predicates() {
        let prod = CompiledFilter::compile(vault(1), None, "env=PROD").unwrap();
        assert!(prod.matches(&attrs(&[("ENV", "prod")])));

        let not_prod = CompiledFilter::compile(vault(2), None, "NOT env=prod").unwrap();
        assert!(!not_prod.matches(&attrs(&[("env", "prod")])));
        assert!(not_prod.matches(&attrs(&[("env", "staging")])));

        let key_exists = CompiledFilter::compile(vault(3), None, "env=*").unwrap();
        assert!(key_exists.matches(&attrs(&[("env", "anything")])));
        assert!(!key_exists.matches(&attrs(&[])));

        let value_exists = CompiledFilter::compile(vault(4), None, "*=error").unwrap();
        assert!(value_exists.matches(&attrs(&[("level", "ERROR")])));
        assert!(!value_exists.matches(&attrs(&[("level", "info")])));
    }

    #[test]
    fn parenthesised_expression_is_a_compile_error() {
        let err = CompiledFilter::compile(vault(1), None, "(env=prod)").unwrap_err();
        assert!(matches!(err, FilterError::InvalidFilter { .. }));
    }

    #[test]
    fn at_most_one_filter_per_vault() {
        let set = FilterSet::new()
            .add_or_update(CompiledFilter::compile(vault(1), None, "*").unwrap())
            .add_or_update(CompiledFilter::compile(vault(1), None, "+").unwrap());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn without_returns_none_once_empty() {
        let set = FilterSet::new().add_or_update(CompiledFilter::compile(vault(1), None, "*").unwrap());
        assert!(set.without(&[vault(1)]).is_none());
    }
}
