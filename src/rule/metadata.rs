use super::RuntimeRule;
use crate::core::RuleKind;
use std::sync::Arc;

/// Ordered collection of runtime rules owned by one scope.
#[derive(Debug, Clone, Default)]
pub struct RuleMetadata {
    rules: Vec<Arc<dyn RuntimeRule>>,
}

impl RuleMetadata {
    pub fn new(rules: Vec<Arc<dyn RuntimeRule>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Arc<dyn RuntimeRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn count_of(&self, kind: RuleKind) -> usize {
        self.rules.iter().filter(|r| r.kind() == kind).count()
    }

    pub fn find_by_kind(&self, kind: RuleKind) -> impl Iterator<Item = &Arc<dyn RuntimeRule>> {
        self.rules.iter().filter(move |r| r.kind() == kind)
    }

    /// Returns the rule of `kind` when exactly one exists.
    pub fn single(&self, kind: RuleKind) -> Option<&Arc<dyn RuntimeRule>> {
        let mut found = self.find_by_kind(kind);
        let first = found.next()?;
        match found.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// Finds every rule of the concrete type `T`.
    pub fn find_rules<T: RuntimeRule>(&self) -> Vec<&T> {
        self.rules
            .iter()
            .filter_map(|r| r.as_any().downcast_ref::<T>())
            .collect()
    }

    pub fn find_single_rule<T: RuntimeRule>(&self) -> Option<&T> {
        let found = self.find_rules::<T>();
        if found.len() == 1 { found.into_iter().next() } else { None }
    }

    /// Rule kinds in rule order.
    pub fn kinds(&self) -> Vec<RuleKind> {
        self.rules.iter().map(|r| r.kind()).collect()
    }

    /// Returns a copy where every rule of `kind` is replaced by `replacement`,
    /// inserted at the position of the first replaced rule.
    pub fn with_replaced_kind(&self, kind: RuleKind, replacement: Vec<Arc<dyn RuntimeRule>>) -> Self {
        let position = self.rules.iter().position(|r| r.kind() == kind);
        let mut rules: Vec<Arc<dyn RuntimeRule>> = self
            .rules
            .iter()
            .filter(|r| r.kind() != kind)
            .cloned()
            .collect();
        let at = position.unwrap_or(rules.len()).min(rules.len());
        for (offset, rule) in replacement.into_iter().enumerate() {
            rules.insert(at + offset, rule);
        }
        Self { rules }
    }
}
