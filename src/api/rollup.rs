//! Rollup function selection for render queries.
//!
//! The counterpart of carbon's storage-aggregation rules, applied at query
//! time: the first rule whose suffix matches the target's path expression
//! supplies the backend aggregation wrapped around the selector. Rules can
//! only see the path suffix because the carbonapi v3 protocol carries no
//! consolidateBy hint.

use regex::Regex;

use crate::config::GatewayConfig;

pub struct RollupTable {
    rules: Vec<RollupRule>,
    default_func: String,
}

struct RollupRule {
    suffix: Regex,
    func: String,
}

impl RollupTable {
    /// Compile the configured rules, in declaration order. Suffixes are
    /// anchored at the end of the path.
    pub fn compile(config: &GatewayConfig) -> Result<Self, regex::Error> {
        let rules = config
            .rollups
            .iter()
            .map(|rule| {
                Ok(RollupRule {
                    suffix: Regex::new(&format!("{}$", rule.match_suffix))?,
                    func: rule.rollup_func.clone(),
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(RollupTable {
            rules,
            default_func: config.default_rollup_func.clone(),
        })
    }

    /// First matching rule wins; no match falls back to the default.
    pub fn func_for(&self, path: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.suffix.is_match(path))
            .map(|rule| rule.func.as_str())
            .unwrap_or(&self.default_func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RollupRuleConfig;

    fn table(rules: &[(&str, &str)]) -> RollupTable {
        let config = GatewayConfig {
            rollups: rules
                .iter()
                .map(|(suffix, func)| RollupRuleConfig {
                    match_suffix: suffix.to_string(),
                    rollup_func: func.to_string(),
                })
                .collect(),
            default_rollup_func: "avg_over_time".to_string(),
            ..GatewayConfig::default()
        };
        RollupTable::compile(&config).unwrap()
    }

    #[test]
    fn first_match_wins() {
        let table = table(&[
            ("\\.count", "sum_over_time"),
            ("\\.(count|sum)", "last_over_time"),
        ]);
        assert_eq!(table.func_for("statsd.api.requests.count"), "sum_over_time");
    }

    #[test]
    fn suffix_is_anchored() {
        let table = table(&[("\\.count", "sum_over_time")]);
        assert_eq!(table.func_for("a.count.rate"), "avg_over_time");
        assert_eq!(table.func_for("a.rate.count"), "sum_over_time");
    }

    #[test]
    fn default_applies_without_rules() {
        let table = table(&[]);
        assert_eq!(table.func_for("anything.at.all"), "avg_over_time");
    }

    #[test]
    fn bad_regex_fails_compilation() {
        let config = GatewayConfig {
            rollups: vec![RollupRuleConfig {
                match_suffix: "(".to_string(),
                rollup_func: "sum_over_time".to_string(),
            }],
            ..GatewayConfig::default()
        };
        assert!(RollupTable::compile(&config).is_err());
    }
}
