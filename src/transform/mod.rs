//! Suffix rewrite engine for host names.
//!
//! A rule maps one or more accepted trailing domain labels to a single
//! replacement. Rules are tried in declaration order and the first suffix that
//! matches at a `.` boundary wins:
//!
//! ```text
//! from: [example.com]  to: internal.example.com
//! svc.example.com  =>  svc.internal.example.com
//! svc.other.com    =>  svc.other.com
//! ```

pub mod source;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use source::{ConfigMapRuleSource, RULES_CONFIGMAP_KEY, RuleSource, StaticRules};

/// Separator a suffix must be preceded by to match
const LABEL_SEPARATOR: char = '.';

/// A single suffix rewrite rule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRule {
    /// Accepted suffixes, tried in order
    pub from: Vec<String>,
    /// Replacement suffix
    pub to: String,
}

impl TransformRule {
    pub fn new<I, S>(from: I, to: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            from: from.into_iter().map(Into::into).collect(),
            to: to.into(),
        }
    }

    /// Rewrite `input` if one of this rule's suffixes matches
    fn rewrite(&self, input: &str) -> Option<String> {
        self.from.iter().find_map(|suffix| {
            if suffix.is_empty() {
                return None;
            }
            let head = input
                .strip_suffix(suffix.as_str())?
                .strip_suffix(LABEL_SEPARATOR)?;
            Some(format!("{}{}{}", head, LABEL_SEPARATOR, self.to))
        })
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.from.is_empty() || self.from.iter().any(String::is_empty) {
            return Err(Error::Config(format!(
                "transform {} ({}) must list at least one non-empty suffix",
                index, self
            )));
        }
        if self.to.is_empty() {
            return Err(Error::Config(format!(
                "transform {} ({}) has an empty replacement",
                index, self
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TransformRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.from.join(", "), self.to)
    }
}

/// Rule document as stored in a file or ConfigMap
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transforms {
    #[serde(default)]
    pub transforms: Vec<TransformRule>,
}

impl Transforms {
    /// Parse and validate a YAML rule document
    pub fn from_yaml(document: &str) -> Result<Self> {
        let parsed: Transforms = serde_yaml::from_str(document)
            .map_err(|e| Error::Config(format!("unable to decode transforms: {}", e)))?;
        for (index, rule) in parsed.transforms.iter().enumerate() {
            rule.validate(index)?;
        }
        Ok(parsed)
    }

    pub fn into_rules(self) -> Vec<TransformRule> {
        self.transforms
    }
}

/// Rewrite the trailing suffix of `input` using the first matching rule.
///
/// Returns the input unchanged when no rule matches. Never fails.
pub fn apply(rules: &[TransformRule], input: &str) -> String {
    rules
        .iter()
        .find_map(|rule| rule.rewrite(input))
        .unwrap_or_else(|| input.to_string())
}
