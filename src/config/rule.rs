use crate::core::{RuleKind, RuleScope};
use std::any::Any;
use std::fmt;

/// Desired behaviour of one rule kind, scoped to a database or to the cluster.
///
/// The catalog is open: concrete configurations live next to their builders and
/// are addressed through [`RuleKind`], never through a closed enum.
pub trait RuleConfiguration: fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> RuleKind;

    fn scope(&self) -> RuleScope;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn clone_box(&self) -> Box<dyn RuleConfiguration>;
}

impl dyn RuleConfiguration {
    pub fn downcast_ref<T: RuleConfiguration>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: RuleConfiguration>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl Clone for Box<dyn RuleConfiguration> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Implements [`RuleConfiguration`] for a `Clone` configuration struct.
#[macro_export]
macro_rules! impl_rule_configuration {
    ($ty:ty, $kind:expr, $scope:expr) => {
        impl $crate::config::RuleConfiguration for $ty {
            fn kind(&self) -> $crate::core::RuleKind {
                $kind
            }

            fn scope(&self) -> $crate::core::RuleScope {
                $scope
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn clone_box(&self) -> Box<dyn $crate::config::RuleConfiguration> {
                Box::new(self.clone())
            }
        }
    };
}

/// Finds the first configuration of `kind` in a rule configuration list.
pub fn find_rule_configuration<'a>(
    configs: &'a [Box<dyn RuleConfiguration>],
    kind: RuleKind,
) -> Option<&'a dyn RuleConfiguration> {
    configs.iter().find(|c| c.kind() == kind).map(|c| &**c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct DummyRuleConfiguration {
        value: u32,
    }

    crate::impl_rule_configuration!(
        DummyRuleConfiguration,
        RuleKind::new("dummy"),
        RuleScope::Database
    );

    #[test]
    fn test_downcast_and_clone_box() {
        let mut boxed: Box<dyn RuleConfiguration> = Box::new(DummyRuleConfiguration { value: 1 });
        boxed
            .downcast_mut::<DummyRuleConfiguration>()
            .unwrap()
            .value = 7;

        let cloned = boxed.clone();
        assert_eq!(cloned.kind(), RuleKind::new("dummy"));
        assert_eq!(
            cloned.downcast_ref::<DummyRuleConfiguration>(),
            Some(&DummyRuleConfiguration { value: 7 })
        );
    }

    #[test]
    fn test_find_rule_configuration() {
        let configs: Vec<Box<dyn RuleConfiguration>> =
            vec![Box::new(DummyRuleConfiguration { value: 3 })];
        assert!(find_rule_configuration(&configs, RuleKind::new("dummy")).is_some());
        assert!(find_rule_configuration(&configs, RuleKind::new("other")).is_none());
    }
}
