//! Ranked intent rules for free-text utterances.
//!
//! Rules are evaluated in order against the lowercased input; the first rule
//! with a phrase contained in the input wins. The amount pattern runs after
//! every phrase rule, and anything left over is a clarification.

use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    ViewBill,
    AnalyzeBill,
    DownloadBill,
    PayBill,
    /// A bare amount such as `75` or `75.00`. May be zero.
    Amount(Decimal),
    /// Nothing matched.
    Clarify,
}

/// One phrase rule: any contained phrase selects `intent`.
#[derive(Debug, Clone)]
pub struct IntentRule {
    /// Rule name for logs.
    pub name: &'static str,
    /// Lowercase phrases, matched by substring containment.
    pub phrases: Vec<&'static str>,
    pub intent: Intent,
}

impl IntentRule {
    fn matches(&self, lower: &str) -> bool {
        self.phrases.iter().any(|p| lower.contains(p))
    }
}

/// Ordered rule table.
pub struct IntentRules {
    rules: Vec<IntentRule>,
    amount: Regex,
}

impl IntentRules {
    /// The assistant's rule table: view > analysis > download > pay >
    /// payment fallback > amount > clarification.
    pub fn default_rules() -> Self {
        let rules = vec![
            IntentRule {
                name: "view_bill",
                phrases: vec![
                    "view bill",
                    "view my bill",
                    "see my bill",
                    "show my bill",
                    "show bill",
                    "bill summary",
                    "check my bill",
                ],
                intent: Intent::ViewBill,
            },
            IntentRule {
                name: "analyze_bill",
                phrases: vec![
                    "analyze",
                    "analyse",
                    "analysis",
                    "why is my bill",
                    "bill higher",
                    "bill increase",
                    "bill went up",
                    "bill change",
                    "explain my bill",
                ],
                intent: Intent::AnalyzeBill,
            },
            IntentRule {
                name: "download",
                phrases: vec!["download", "pdf"],
                intent: Intent::DownloadBill,
            },
            IntentRule {
                name: "pay_bill",
                phrases: vec!["pay bill", "pay my bill", "make a payment", "pay now"],
                intent: Intent::PayBill,
            },
            IntentRule {
                name: "payment_fallback",
                phrases: vec!["payment", "pay"],
                intent: Intent::PayBill,
            },
        ];

        Self {
            rules,
            amount: Regex::new(r"^[0-9]+(\.[0-9]{2})?$").unwrap(),
        }
    }

    /// Rule table with no phrase rules (amounts only).
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            amount: Regex::new(r"^[0-9]+(\.[0-9]{2})?$").unwrap(),
        }
    }

    /// Append a phrase rule at the lowest priority.
    pub fn push(&mut self, rule: IntentRule) {
        self.rules.push(rule);
    }

    /// Classify one utterance.
    pub fn evaluate(&self, text: &str) -> Intent {
        let lower = text.to_lowercase();

        if let Some(rule) = self.rules.iter().find(|r| r.matches(&lower)) {
            debug!(rule = rule.name, "Intent rule matched");
            return rule.intent.clone();
        }

        let trimmed = text.trim();
        if self.amount.is_match(trimmed) {
            if let Ok(amount) = Decimal::from_str(trimmed) {
                return Intent::Amount(amount);
            }
        }

        Intent::Clarify
    }
}

impl Default for IntentRules {
    fn default() -> Self {
        Self::default_rules()
    }
}
