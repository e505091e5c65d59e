//! Weighted-pattern document categorization.
//!
//! Every category owns an ordered list of `(pattern, weight)` rules. A category's score is
//! the sum of the weights of its matching rules; each rule counts once no matter how often
//! it matches. The strictly highest score wins, so ties go to the category declared first.
//!
//! Confidence is the winning score relative to the largest weight sum of any single
//! category. That denominator is shared by every category, so a perfect match on a
//! smaller category stays below 100%.

mod rules;

pub use rules::{DEFAULT_RULES, ERRORS, OTHER_DOCUMENTS};

use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scores below this fall back to [`OTHER_DOCUMENTS`].
pub const MIN_CATEGORY_SCORE: u32 = 3;

/// Errors from rule registration.
#[derive(Debug, Error)]
pub enum CategorizeError {
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule weight must be positive (category '{0}')")]
    ZeroWeight(String),

    #[error("Category name must not be empty")]
    EmptyCategory,
}

/// A rule as supplied by configuration or at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub pattern: String,
    pub weight: u32,
}

/// Result of categorizing a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Categorization {
    pub category: String,
    /// 0-100
    pub confidence: f64,
    /// Raw score of the best category, before the threshold override.
    pub score: u32,
}

impl Categorization {
    fn other() -> Self {
        Self {
            category: OTHER_DOCUMENTS.to_string(),
            confidence: 0.0,
            score: 0,
        }
    }
}

/// Per-category scoring detail returned by [`Categorizer::explain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: u32,
    /// Source text of every pattern that matched.
    pub matched: Vec<String>,
}

struct Rule {
    pattern: Regex,
    weight: u32,
}

struct CategoryEntry {
    name: String,
    rules: Vec<Rule>,
}

impl CategoryEntry {
    fn total_weight(&self) -> u32 {
        self.rules.iter().map(|r| r.weight).sum()
    }

    fn score(&self, normalized: &str) -> u32 {
        self.rules
            .iter()
            .filter(|r| r.pattern.is_match(normalized))
            .map(|r| r.weight)
            .sum()
    }
}

#[derive(Default)]
struct RuleTable {
    categories: Vec<CategoryEntry>,
    /// Reset on every registration, filled on first use.
    max_score: OnceLock<u32>,
}

impl RuleTable {
    fn max_attainable(&self) -> u32 {
        *self.max_score.get_or_init(|| {
            self.categories
                .iter()
                .map(CategoryEntry::total_weight)
                .max()
                .unwrap_or(0)
        })
    }

    fn push(&mut self, category: &str, pattern: Regex, weight: u32) {
        let rule = Rule { pattern, weight };
        match self.categories.iter_mut().find(|c| c.name == category) {
            Some(entry) => entry.rules.push(rule),
            None => self.categories.push(CategoryEntry {
                name: category.to_string(),
                rules: vec![rule],
            }),
        }
        self.max_score = OnceLock::new();
    }
}

fn compile(pattern: &str) -> Result<Regex, CategorizeError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| CategorizeError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Scores text against a rule table owned by this instance.
///
/// Safe to share between workers; registration takes a write lock and invalidates the
/// cached maximum score.
pub struct Categorizer {
    table: RwLock<RuleTable>,
}

impl Categorizer {
    /// Categorizer with the built-in rule table.
    pub fn new() -> Self {
        let mut table = RuleTable::default();
        for (category, rules) in DEFAULT_RULES {
            for (pattern, weight) in *rules {
                let regex = compile(pattern).expect("built-in category pattern is valid");
                table.push(category, regex, *weight);
            }
        }
        Self {
            table: RwLock::new(table),
        }
    }

    /// Categorizer with no rules; everything is "Other Documents".
    pub fn empty() -> Self {
        Self {
            table: RwLock::new(RuleTable::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RuleTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a rule. Unknown categories are appended after the existing ones.
    pub fn register_rule(
        &self,
        category: &str,
        pattern: &str,
        weight: u32,
    ) -> Result<(), CategorizeError> {
        let category = category.trim();
        if category.is_empty() {
            return Err(CategorizeError::EmptyCategory);
        }
        if weight == 0 {
            return Err(CategorizeError::ZeroWeight(category.to_string()));
        }
        let regex = compile(pattern)?;

        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(category, regex, weight);

        tracing::debug!(category, pattern, weight, "Registered category rule");
        Ok(())
    }

    pub fn register(&self, rule: &CategoryRule) -> Result<(), CategorizeError> {
        self.register_rule(&rule.category, &rule.pattern, rule.weight)
    }

    /// Category names in declaration order.
    pub fn categories(&self) -> Vec<String> {
        self.read()
            .categories
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Largest weight sum of any single category.
    pub fn max_attainable_score(&self) -> u32 {
        self.read().max_attainable()
    }

    /// Assign a category to `text`.
    pub fn categorize(&self, text: &str) -> Categorization {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return Categorization::other();
        }

        let table = self.read();
        let mut best: Option<&str> = None;
        let mut highest = 0;

        for entry in &table.categories {
            let score = entry.score(&normalized);
            if score > highest {
                highest = score;
                best = Some(entry.name.as_str());
            }
        }

        let max = table.max_attainable();
        let confidence = if max == 0 {
            0.0
        } else {
            (f64::from(highest) / f64::from(max) * 100.0).min(100.0)
        };

        let category = match best {
            Some(name) if highest >= MIN_CATEGORY_SCORE => name.to_string(),
            _ => OTHER_DOCUMENTS.to_string(),
        };

        tracing::trace!(
            category = %category,
            score = highest,
            confidence,
            "Categorized text"
        );

        Categorization {
            category,
            confidence,
            score: highest,
        }
    }

    /// Score every category and list the patterns that matched.
    pub fn explain(&self, text: &str) -> Vec<CategoryScore> {
        let normalized = text.trim().to_lowercase();
        self.read()
            .categories
            .iter()
            .map(|entry| {
                let matched: Vec<String> = entry
                    .rules
                    .iter()
                    .filter(|r| !normalized.is_empty() && r.pattern.is_match(&normalized))
                    .map(|r| r.pattern.as_str().to_string())
                    .collect();
                CategoryScore {
                    category: entry.name.clone(),
                    score: entry.score(&normalized),
                    matched,
                }
            })
            .collect()
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}
