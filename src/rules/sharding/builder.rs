use super::config::{SHARDING, ShardingRuleConfiguration};
use super::rule::ShardingRule;
use crate::config::RuleConfiguration;
use crate::core::{MetaError, Result, RuleKind};
use crate::rule::{DataNode, DatabaseRuleBuildContext, DatabaseRuleBuilder, RuntimeRule};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

lazy_static::lazy_static! {
    static ref INLINE_RANGE: Regex = Regex::new(r"\$\{\s*(\d+)\s*\.\.\s*(\d+)\s*\}").unwrap();
}

const MAX_INLINE_EXPANSION: usize = 4096;

/// Expands `${lo..hi}` ranges, e.g. `ds_${0..1}.t_${0..1}` into four nodes.
///
/// The total across all ranges of one expression is capped at
/// `MAX_INLINE_EXPANSION` nodes.
fn expand_inline(expr: &str) -> std::result::Result<Vec<String>, String> {
    let mut expanded = Vec::new();
    expand_into(expr, &mut expanded)
        .map_err(|reason| format!("'{}' {}", expr.trim(), reason))?;
    Ok(expanded)
}

fn expand_into(expr: &str, out: &mut Vec<String>) -> std::result::Result<(), String> {
    let Some(caps) = INLINE_RANGE.captures(expr) else {
        if out.len() >= MAX_INLINE_EXPANSION {
            return Err(format!("expands to more than {} nodes", MAX_INLINE_EXPANSION));
        }
        out.push(expr.trim().to_string());
        return Ok(());
    };
    let Some(whole) = caps.get(0) else {
        return Err("has a malformed range".to_string());
    };
    let lo: u64 = caps[1]
        .parse()
        .map_err(|_| format!("has range bound '{}' that is too large", &caps[1]))?;
    let hi: u64 = caps[2]
        .parse()
        .map_err(|_| format!("has range bound '{}' that is too large", &caps[2]))?;
    if lo > hi {
        return Err(format!("has empty range '{}'", whole.as_str()));
    }

    let (prefix, suffix) = (&expr[..whole.start()], &expr[whole.end()..]);
    for i in lo..=hi {
        expand_into(&format!("{}{}{}", prefix, i, suffix), out)?;
    }
    Ok(())
}

pub struct ShardingRuleBuilder;

impl DatabaseRuleBuilder for ShardingRuleBuilder {
    fn kind(&self) -> RuleKind {
        SHARDING
    }

    /// After every data-source container rule.
    fn order(&self) -> i32 {
        20
    }

    fn build(
        &self,
        config: &dyn RuleConfiguration,
        ctx: &DatabaseRuleBuildContext<'_>,
    ) -> Result<Vec<Arc<dyn RuntimeRule>>> {
        let config = config
            .downcast_ref::<ShardingRuleConfiguration>()
            .ok_or_else(|| MetaError::rule_build(SHARDING, ctx.database_name, "unexpected configuration type"))?;
        let fail = |reason: String| MetaError::rule_build(SHARDING, ctx.database_name, reason);

        let logical: BTreeMap<String, Vec<String>> = ctx
            .built_rules
            .iter()
            .filter_map(|r| r.as_data_source_container())
            .flat_map(|c| c.logical_data_sources())
            .collect();
        let hidden: BTreeSet<&str> = logical.values().flatten().map(|s| s.as_str()).collect();
        let known: BTreeSet<&str> = ctx
            .resource
            .names()
            .into_iter()
            .chain(logical.keys().map(|s| s.as_str()))
            .collect();
        let default_sources: Vec<&str> = logical
            .keys()
            .map(|s| s.as_str())
            .chain(ctx.resource.names().into_iter().filter(|n| !hidden.contains(n)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut table_nodes = BTreeMap::new();
        for table in &config.tables {
            let key = table.logic_table.trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(fail("logic table name is empty".to_string()));
            }
            if table_nodes.contains_key(&key) {
                return Err(fail(format!("logic table '{}' is declared twice", table.logic_table)));
            }

            let mut nodes = Vec::new();
            if table.actual_data_nodes.is_empty() {
                nodes.extend(default_sources.iter().map(|ds| DataNode {
                    data_source: ds.to_string(),
                    table: table.logic_table.clone(),
                }));
            }
            for expr in &table.actual_data_nodes {
                for text in expand_inline(expr).map_err(|reason| {
                    fail(format!("data nodes of '{}': {}", table.logic_table, reason))
                })? {
                    let node = DataNode::parse(&text).ok_or_else(|| {
                        fail(format!(
                            "data node '{}' of '{}' is not of the form <data source>.<table>",
                            text, table.logic_table
                        ))
                    })?;
                    if !known.contains(node.data_source.as_str()) {
                        return Err(fail(format!(
                            "data node '{}' of '{}' refers to unknown data source '{}'",
                            node, table.logic_table, node.data_source
                        )));
                    }
                    nodes.push(node);
                }
            }
            if nodes.is_empty() {
                return Err(fail(format!("logic table '{}' has no data nodes", table.logic_table)));
            }
            table_nodes.insert(key, nodes);
        }

        let mut binding_groups = Vec::new();
        for group in &config.binding_table_groups {
            let members: BTreeSet<String> = group
                .split(',')
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
            if let Some(missing) = members.iter().find(|t| !table_nodes.contains_key(*t)) {
                return Err(fail(format!(
                    "binding group '{}' names '{}', which is not a sharding table",
                    group, missing
                )));
            }
            if !members.is_empty() {
                binding_groups.push(members);
            }
        }

        if let Some(conflict) = config
            .broadcast_tables
            .iter()
            .find(|t| table_nodes.contains_key(&t.to_ascii_lowercase()))
        {
            return Err(fail(format!(
                "'{}' cannot be both a sharding table and a broadcast table",
                conflict
            )));
        }

        Ok(vec![Arc::new(ShardingRule {
            configuration: config.clone(),
            table_nodes,
            binding_groups,
            broadcast_tables: config.broadcast_tables.clone(),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigurationProperties, DataSourceConfiguration};
    use crate::instance::{InstanceContext, ModeConfiguration};
    use crate::metadata::resource::{DataSourceHandle, ResourceMetaData};
    use crate::rule::RoutingRule;
    use crate::rules::ShardingTableRuleConfiguration;
    use crate::rules::readwrite_splitting::{ReadwriteSplittingRuleBuilder, ReadwriteSplittingRuleConfiguration};

    fn resource(names: &[&str]) -> ResourceMetaData {
        ResourceMetaData::new(
            names
                .iter()
                .map(|n| {
                    let url = format!("mysql://127.0.0.1:3306/{}", n);
                    let handle = DataSourceHandle::create("db", n, DataSourceConfiguration::new(&url)).unwrap();
                    (n.to_string(), Arc::new(handle))
                })
                .collect(),
        )
    }

    fn build_with(
        config: &ShardingRuleConfiguration,
        resource: &ResourceMetaData,
        built_rules: &[Arc<dyn RuntimeRule>],
    ) -> Result<Vec<Arc<dyn RuntimeRule>>> {
        let instance = InstanceContext::proxy("127.0.0.1", 3307, ModeConfiguration::standalone("memory"));
        let props = ConfigurationProperties::default();
        let ctx = DatabaseRuleBuildContext {
            database_name: "sharding_db",
            resource,
            built_rules,
            instance: &instance,
            props: &props,
        };
        ShardingRuleBuilder.build(config, &ctx)
    }

    #[test]
    fn test_expand_inline_ranges() {
        assert_eq!(
            expand_inline("ds_${0..1}.t_order_${0..1}").unwrap(),
            vec!["ds_0.t_order_0", "ds_0.t_order_1", "ds_1.t_order_0", "ds_1.t_order_1"]
        );
        assert_eq!(expand_inline("ds_0.t_user").unwrap(), vec!["ds_0.t_user"]);
        assert!(expand_inline("ds_${3..1}.t").is_err());
    }

    #[test]
    fn test_expand_inline_caps_total_nodes_across_ranges() {
        // Each range alone is small; together they would produce a million nodes.
        let err = expand_inline("ds_${0..999}.t_${0..999}").unwrap_err();
        assert!(err.contains("more than 4096 nodes"), "{}", err);

        assert_eq!(expand_inline("ds_${0..63}.t_${0..63}").unwrap().len(), 4096);
        assert!(expand_inline("ds_${0..63}.t_${0..64}").is_err());
        assert!(expand_inline("t_${0..4096}").is_err());
    }

    #[test]
    fn test_oversized_data_node_expression_fails_build() {
        let config = ShardingRuleConfiguration::default()
            .with_table(ShardingTableRuleConfiguration::new("t_order", &["ds_${0..999}.t_order_${0..999}"]));
        let err = build_with(&config, &resource(&["ds_0"]), &[]).unwrap_err();
        assert!(matches!(err, MetaError::RuleBuild { .. }), "{:?}", err);
        assert!(err.to_string().contains("t_order"));
    }

    #[test]
    fn test_routes_logic_tables_to_data_nodes() {
        let config = ShardingRuleConfiguration::default()
            .with_table(ShardingTableRuleConfiguration::new("t_order", &["ds_${0..1}.t_order_${0..1}"]))
            .with_table(ShardingTableRuleConfiguration::new("t_order_item", &["ds_${0..1}.t_order_item_${0..1}"]))
            .with_binding_group("t_order, t_order_item")
            .with_broadcast_table("t_dict");
        let rules = build_with(&config, &resource(&["ds_0", "ds_1"]), &[]).unwrap();
        let rule = rules[0].as_any().downcast_ref::<ShardingRule>().unwrap();

        assert_eq!(rule.data_nodes("T_ORDER").unwrap().len(), 4);
        assert!(rule.binding_group("t_order_item").unwrap().contains("t_order"));
        assert!(rules[0].as_broadcast().unwrap().is_broadcast_table("T_DICT"));
        assert_eq!(rule.data_source_names().len(), 2);
    }

    #[test]
    fn test_unknown_data_source_fails_build() {
        let config = ShardingRuleConfiguration::default()
            .with_table(ShardingTableRuleConfiguration::new("t_order", &["ds_9.t_order"]));
        let err = build_with(&config, &resource(&["ds_0"]), &[]).unwrap_err();
        assert!(err.to_string().contains("ds_9"));
    }

    #[test]
    fn test_logical_data_sources_of_earlier_rules_are_visible() {
        let resource = resource(&["primary", "replica"]);
        let readwrite = ReadwriteSplittingRuleConfiguration::default().with_data_source("ds_rw", "primary", &["replica"]);
        let instance = InstanceContext::proxy("127.0.0.1", 3307, ModeConfiguration::standalone("memory"));
        let props = ConfigurationProperties::default();
        let built = ReadwriteSplittingRuleBuilder
            .build(
                &readwrite,
                &DatabaseRuleBuildContext {
                    database_name: "sharding_db",
                    resource: &resource,
                    built_rules: &[],
                    instance: &instance,
                    props: &props,
                },
            )
            .unwrap();

        let config = ShardingRuleConfiguration::default()
            .with_table(ShardingTableRuleConfiguration::new("t_order", &["ds_rw.t_order"]))
            .with_table(ShardingTableRuleConfiguration::new("t_user", &[]));
        let rules = build_with(&config, &resource, &built).unwrap();
        let routing = rules[0].as_routing().unwrap();
        assert_eq!(routing.data_nodes("t_order").unwrap()[0].data_source, "ds_rw");
        let defaults: Vec<_> = routing
            .data_nodes("t_user")
            .unwrap()
            .iter()
            .map(|n| n.data_source.as_str())
            .collect();
        assert_eq!(defaults, vec!["ds_rw"]);
    }

    #[test]
    fn test_binding_group_with_unknown_table_fails() {
        let config = ShardingRuleConfiguration::default()
            .with_table(ShardingTableRuleConfiguration::new("t_order", &["ds_0.t_order"]))
            .with_binding_group("t_order,t_missing");
        let err = build_with(&config, &resource(&["ds_0"]), &[]).unwrap_err();
        assert!(err.to_string().contains("t_missing"));
    }
}
