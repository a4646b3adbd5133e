//! Redaction of logged values.
//!
//! # Responsibilities
//! - Mask fields of declared shapes according to their `SanitizeRule`
//! - Recurse through sequences, mappings and shapes at any depth
//! - Replace opaque values, cycles and over-deep nesting with placeholders
//!
//! # Design Decisions
//! - Rules are keyed by shape name and field name, never by runtime type
//! - Masked output is tagged (`LogValue::Masked`) so a second pass is a no-op
//! - Failures to read a value are recovered locally with a placeholder

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::schema::{default_pattern, SanitizeConfig};
use crate::observability::value::{opaque_placeholder, LogValue};

pub const CIRCULAR_PLACEHOLDER: &str = "[Circular]";
pub const MAX_DEPTH_PLACEHOLDER: &str = "[MaxDepth]";
pub const UNAVAILABLE_PLACEHOLDER: &str = "[Unavailable]";

/// Masking policy for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeRule {
    pattern: String,
    show_first: usize,
    show_last: usize,
}

impl Default for SanitizeRule {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            show_first: 0,
            show_last: 0,
        }
    }
}

impl SanitizeRule {
    /// Replacement core. An empty pattern falls back to the default one.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.pattern = if pattern.is_empty() {
            default_pattern()
        } else {
            pattern
        };
        self
    }

    pub fn show_first(mut self, count: usize) -> Self {
        self.show_first = count;
        self
    }

    pub fn show_last(mut self, count: usize) -> Self {
        self.show_last = count;
        self
    }

    /// Mask `value`: leading chars, then the pattern, then trailing chars.
    ///
    /// When the revealed chars would cover the whole value only the pattern
    /// is returned.
    pub fn apply(&self, value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        let len = chars.len();
        if self.show_first.saturating_add(self.show_last) >= len {
            return self.pattern.clone();
        }

        let mut masked = String::with_capacity(value.len() + self.pattern.len());
        masked.extend(&chars[..self.show_first]);
        masked.push_str(&self.pattern);
        masked.extend(&chars[len - self.show_last..]);
        masked
    }
}

/// Rule set: shape name → field name → rule.
#[derive(Debug, Clone, Default)]
pub struct SanitizeRules {
    shapes: HashMap<String, HashMap<String, SanitizeRule>>,
}

impl SanitizeRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or replace) the rule for `shape.field`.
    pub fn rule(
        &mut self,
        shape: impl Into<String>,
        field: impl Into<String>,
        rule: SanitizeRule,
    ) -> &mut Self {
        self.shapes
            .entry(shape.into())
            .or_default()
            .insert(field.into(), rule);
        self
    }

    /// Layer the rules of a configuration file over these.
    pub fn overlay_config(&mut self, config: &SanitizeConfig) {
        for rule in &config.rules {
            self.rule(
                rule.shape.clone(),
                rule.field.clone(),
                SanitizeRule::default()
                    .pattern(rule.pattern.clone())
                    .show_first(rule.show_first)
                    .show_last(rule.show_last),
            );
        }
    }

    pub fn get(&self, shape: &str, field: &str) -> Option<&SanitizeRule> {
        self.shapes.get(shape)?.get(field)
    }

    fn for_shape(&self, shape: &str) -> Option<&HashMap<String, SanitizeRule>> {
        self.shapes.get(shape)
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// Produces redacted copies of `LogValue` trees.
#[derive(Debug, Clone, Copy)]
pub struct SanitizationEngine {
    max_depth: usize,
}

impl Default for SanitizationEngine {
    fn default() -> Self {
        Self { max_depth: 32 }
    }
}

impl SanitizationEngine {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    /// Return a redacted, structurally equivalent copy of `value`.
    ///
    /// The result contains no `Shared` or `Opaque` nodes and sanitizing it
    /// again yields the same tree.
    pub fn sanitize(&self, value: &LogValue, rules: &SanitizeRules) -> LogValue {
        let mut visiting = Vec::new();
        self.visit(value, rules, &mut visiting, 0)
    }

    fn visit(
        &self,
        value: &LogValue,
        rules: &SanitizeRules,
        visiting: &mut Vec<usize>,
        depth: usize,
    ) -> LogValue {
        if depth > self.max_depth {
            return LogValue::Str(MAX_DEPTH_PLACEHOLDER.to_string());
        }

        match value {
            LogValue::Null
            | LogValue::Bool(_)
            | LogValue::Int(_)
            | LogValue::Float(_)
            | LogValue::Str(_)
            | LogValue::Masked(_) => value.clone(),
            LogValue::Opaque { kind, len } => LogValue::Str(opaque_placeholder(kind, *len)),
            LogValue::Seq(items) => LogValue::Seq(
                items
                    .iter()
                    .map(|item| self.visit(item, rules, visiting, depth + 1))
                    .collect(),
            ),
            LogValue::Map(entries) => LogValue::Map(
                entries
                    .iter()
                    .map(|(key, item)| (key.clone(), self.visit(item, rules, visiting, depth + 1)))
                    .collect(),
            ),
            LogValue::Shape { name, fields } => {
                let shape_rules = rules.for_shape(name);
                let fields = fields
                    .iter()
                    .map(|(field, item)| {
                        let sanitized = match shape_rules.and_then(|r| r.get(field)) {
                            Some(rule) => Self::mask(item, rule, visiting),
                            None => self.visit(item, rules, visiting, depth + 1),
                        };
                        (field.clone(), sanitized)
                    })
                    .collect();
                LogValue::Shape {
                    name: name.clone(),
                    fields,
                }
            }
            LogValue::Shared(node) => {
                let addr = Arc::as_ptr(node) as usize;
                if visiting.contains(&addr) {
                    return LogValue::Str(CIRCULAR_PLACEHOLDER.to_string());
                }
                let Ok(inner) = node.lock() else {
                    tracing::debug!("Shared log value is poisoned, substituting placeholder");
                    return LogValue::Str(UNAVAILABLE_PLACEHOLDER.to_string());
                };
                visiting.push(addr);
                let sanitized = self.visit(&inner, rules, visiting, depth + 1);
                visiting.pop();
                sanitized
            }
        }
    }

    /// Apply `rule` to a rule-bearing field. Scalars are masked through their
    /// text form; anything structured collapses to the bare pattern.
    fn mask(value: &LogValue, rule: &SanitizeRule, visiting: &mut Vec<usize>) -> LogValue {
        match value {
            LogValue::Null => LogValue::Null,
            LogValue::Masked(_) => value.clone(),
            LogValue::Str(s) => LogValue::Masked(rule.apply(s)),
            LogValue::Bool(b) => LogValue::Masked(rule.apply(&b.to_string())),
            LogValue::Int(i) => LogValue::Masked(rule.apply(&i.to_string())),
            LogValue::Float(x) => LogValue::Masked(rule.apply(&x.to_string())),
            LogValue::Shared(node) => {
                let addr = Arc::as_ptr(node) as usize;
                if visiting.contains(&addr) {
                    return LogValue::Masked(rule.pattern.clone());
                }
                match node.lock() {
                    Ok(inner) => {
                        visiting.push(addr);
                        let masked = Self::mask(&inner, rule, visiting);
                        visiting.pop();
                        masked
                    }
                    Err(_) => LogValue::Masked(rule.pattern.clone()),
                }
            }
            LogValue::Seq(_)
            | LogValue::Map(_)
            | LogValue::Shape { .. }
            | LogValue::Opaque { .. } => LogValue::Masked(rule.pattern.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loggable_shape;
    use crate::observability::value::Loggable;
    use std::sync::Mutex;

    struct Card {
        holder: String,
        number: String,
        cvv: u16,
    }

    loggable_shape!(Card { holder, number, cvv });

    struct Wallet {
        owner: String,
        cards: Vec<Card>,
    }

    loggable_shape!(Wallet { owner, cards });

    fn card_rules() -> SanitizeRules {
        let mut rules = SanitizeRules::new();
        rules
            .rule("Card", "number", SanitizeRule::default().show_first(2).show_last(2))
            .rule("Card", "cvv", SanitizeRule::default().pattern("###"));
        rules
    }

    #[test]
    fn test_apply_reveals_edges() {
        let rule = SanitizeRule::default().show_first(2).show_last(2);
        assert_eq!(rule.apply("abcdefgh"), "ab****gh");
        assert_eq!(rule.apply("ab"), "****");
        assert_eq!(rule.apply("abcd"), "****");
        assert_eq!(rule.apply("abcde"), "ab****de");
        assert_eq!(rule.apply(""), "****");
    }

    #[test]
    fn test_apply_counts_chars_not_bytes() {
        let rule = SanitizeRule::default().show_first(1).show_last(1);
        assert_eq!(rule.apply("žluťoučký"), "ž****ý");
    }

    #[test]
    fn test_empty_pattern_falls_back() {
        let rule = SanitizeRule::default().pattern("");
        assert_eq!(rule.apply("secret"), "****");
    }

    #[test]
    fn test_nested_shapes_are_masked() {
        let wallet = Wallet {
            owner: "dana".into(),
            cards: vec![Card {
                holder: "Dana Doe".into(),
                number: "4111111111111111".into(),
                cvv: 123,
            }],
        };

        let out = SanitizationEngine::default().sanitize(&wallet.to_log_value(), &card_rules());
        assert_eq!(
            out.to_json(),
            serde_json::json!({
                "owner": "dana",
                "cards": [{"holder": "Dana Doe", "number": "41****11", "cvv": "###"}]
            })
        );
    }

    #[test]
    fn test_rules_match_shape_names_only() {
        let map = LogValue::Map(vec![("number".into(), LogValue::Str("4111".into()))]);
        let out = SanitizationEngine::default().sanitize(&map, &card_rules());
        assert_eq!(out, map);
    }

    #[test]
    fn test_structured_field_collapses_to_pattern() {
        let value = LogValue::Shape {
            name: "Card".into(),
            fields: vec![(
                "number".into(),
                LogValue::Seq(vec![LogValue::Str("4111".into())]),
            )],
        };
        let out = SanitizationEngine::default().sanitize(&value, &card_rules());
        assert_eq!(out.get("number"), Some(&LogValue::Masked("****".into())));
    }

    #[test]
    fn test_idempotent_and_deterministic() {
        let engine = SanitizationEngine::default();
        let rules = {
            let mut rules = card_rules();
            rules.rule("Card", "holder", SanitizeRule::default().show_first(1).show_last(1));
            rules
        };
        let value = Wallet {
            owner: "x".into(),
            cards: vec![
                Card {
                    holder: "ab".into(),
                    number: "1234567890".into(),
                    cvv: 7,
                },
                Card {
                    holder: "Lee".into(),
                    number: "12".into(),
                    cvv: 999,
                },
            ],
        }
        .to_log_value();

        let once = engine.sanitize(&value, &rules);
        let twice = engine.sanitize(&once, &rules);
        assert_eq!(once, twice);
        assert_eq!(once, engine.sanitize(&value, &rules));
        assert_eq!(once.to_string(), twice.to_string());
    }

    #[test]
    fn test_opaque_values_get_placeholder() {
        let value = LogValue::Seq(vec![LogValue::opaque("stream", 0), LogValue::Int(1)]);
        let out = SanitizationEngine::default().sanitize(&value, &SanitizeRules::new());
        assert_eq!(
            out,
            LogValue::Seq(vec![
                LogValue::Str("[Opaque stream: 0 bytes]".into()),
                LogValue::Int(1)
            ])
        );
    }

    #[test]
    fn test_cycle_terminates_with_placeholder() {
        let node = Arc::new(Mutex::new(LogValue::Null));
        *node.lock().unwrap() = LogValue::Map(vec![
            ("name".into(), LogValue::Str("loop".into())),
            ("next".into(), LogValue::Shared(node.clone())),
        ]);

        let out = SanitizationEngine::default().sanitize(&LogValue::Shared(node.clone()), &SanitizeRules::new());
        assert_eq!(
            out.to_json(),
            serde_json::json!({"name": "loop", "next": CIRCULAR_PLACEHOLDER})
        );

        // break the cycle so the test does not leak
        *node.lock().unwrap() = LogValue::Null;
    }

    #[test]
    fn test_shared_siblings_are_not_cycles() {
        let shared = Arc::new(Mutex::new(LogValue::Int(5)));
        let value = LogValue::Seq(vec![
            LogValue::Shared(shared.clone()),
            LogValue::Shared(shared),
        ]);
        let out = SanitizationEngine::default().sanitize(&value, &SanitizeRules::new());
        assert_eq!(out, LogValue::Seq(vec![LogValue::Int(5), LogValue::Int(5)]));
    }

    #[test]
    fn test_poisoned_shared_value_is_recovered() {
        let node = Arc::new(Mutex::new(LogValue::Int(1)));
        let poison = node.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poison.lock().unwrap();
            panic!("poison");
        })
        .join();

        let out = SanitizationEngine::default().sanitize(&LogValue::Shared(node), &SanitizeRules::new());
        assert_eq!(out, LogValue::Str(UNAVAILABLE_PLACEHOLDER.into()));
    }

    #[test]
    fn test_depth_limit() {
        let mut value = LogValue::Int(0);
        for _ in 0..10 {
            value = LogValue::Seq(vec![value]);
        }
        let out = SanitizationEngine::new(3).sanitize(&value, &SanitizeRules::new());
        assert_eq!(
            out.to_json(),
            serde_json::json!([[[[MAX_DEPTH_PLACEHOLDER]]]])
        );
    }

    #[test]
    fn test_overlay_config_rules() {
        let config: SanitizeConfig = toml::from_str(
            r#"
            [[rules]]
            shape = "Card"
            field = "holder"
            pattern = "<redacted>"
            "#,
        )
        .unwrap();
        let mut rules = card_rules();
        rules.overlay_config(&config);

        assert_eq!(
            rules.get("Card", "holder"),
            Some(&SanitizeRule::default().pattern("<redacted>"))
        );
        assert!(rules.get("Card", "number").is_some());
    }
}
