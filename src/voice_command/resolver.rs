//! Text → command resolution.
//!
//! Three tiers, first success wins:
//!
//! 1. **Exact prefix**: the utterance starts with a trigger at a word boundary.
//! 2. **Fuzzy**: full-ratio similarity against every trigger.
//! 3. **Rules**: the fixed pattern list in [`super::rules`].
//!
//! The resolver is pure. Recording history and unrecognized text is the
//! dispatcher's job.

use crate::config::ResolverConfig;
use crate::similarity;
use crate::voice_command::rules;
use crate::voice_command::table::{ActionKind, CommandEntry, CommandTable, Params, normalize_phrase};
use std::cmp::Ordering;
use tracing::debug;

/// Which tier produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Fuzzy,
    Rule,
}

/// A successfully resolved command.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCommand {
    pub action: ActionKind,
    pub params: Params,
    /// 0-100. Exact and rule hits report 100.
    pub confidence: f32,
    /// The table trigger that matched (exact and fuzzy tiers only).
    pub matched_trigger: Option<String>,
    pub tier: MatchTier,
    /// Rule name for rule hits.
    pub rule: Option<&'static str>,
    /// The response must be prefixed with a "did you mean" hedge.
    pub hedged: bool,
}

impl ResolvedCommand {
    /// Apply the hedge prefix to an action's response when required.
    #[must_use]
    pub fn compose_response(&self, response: &str) -> String {
        match (&self.matched_trigger, self.hedged) {
            (Some(trigger), true) => format!("I think you said '{trigger}'. {response}"),
            _ => response.to_owned(),
        }
    }
}

/// Outcome of [`CommandResolver::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedCommand),
    Unresolved,
}

impl Resolution {
    /// The resolved command, if any.
    #[must_use]
    pub fn command(&self) -> Option<&ResolvedCommand> {
        match self {
            Self::Resolved(cmd) => Some(cmd),
            Self::Unresolved => None,
        }
    }
}

/// Multi-tier resolver.
#[derive(Debug, Clone, Default)]
pub struct CommandResolver {
    config: ResolverConfig,
}

impl CommandResolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Resolve `text` against `table`.
    #[must_use]
    pub fn resolve(&self, text: &str, table: &CommandTable) -> Resolution {
        let text = normalize_phrase(text);
        if text.chars().count() < self.config.min_input_chars {
            return Resolution::Unresolved;
        }

        let resolved = exact_prefix(&text, table)
            .or_else(|| self.fuzzy(&text, table))
            .or_else(|| rule_fallback(&text));

        match resolved {
            Some(cmd) => {
                debug!(
                    text = %text,
                    tier = ?cmd.tier,
                    action = %cmd.action,
                    confidence = cmd.confidence,
                    "command resolved"
                );
                Resolution::Resolved(cmd)
            }
            None => {
                debug!(text = %text, "command unresolved");
                Resolution::Unresolved
            }
        }
    }

    fn fuzzy(&self, text: &str, table: &CommandTable) -> Option<ResolvedCommand> {
        let mut scored: Vec<(u8, &CommandEntry)> = table
            .iter()
            .map(|entry| (similarity::ratio(text, &entry.trigger), entry))
            .collect();
        scored.sort_by(|(sa, ea), (sb, eb)| rank(*sa, &ea.trigger, *sb, &eb.trigger));

        let (score, entry) = scored
            .into_iter()
            .take(self.config.fuzzy_candidates.max(1))
            .find(|(score, _)| *score >= self.config.fuzzy_cutoff)?;

        let mut params = entry.descriptor.params.clone();
        if entry.descriptor.dynamic {
            let skip = entry.trigger.split_whitespace().count();
            let rest = text.split_whitespace().skip(skip).collect::<Vec<_>>().join(" ");
            if !rest.is_empty() {
                params.insert("query".into(), rest);
            }
        }

        Some(ResolvedCommand {
            action: entry.descriptor.action,
            params,
            confidence: f32::from(score),
            matched_trigger: Some(entry.trigger.clone()),
            tier: MatchTier::Fuzzy,
            rule: None,
            // Inclusive: "serch for cats" scores exactly 75 against
            // "search for" and is still hedged.
            hedged: score <= self.config.hedge_ceiling,
        })
    }
}

/// Higher score first, then longer trigger, then lexicographic.
fn rank(score_a: u8, trigger_a: &str, score_b: u8, trigger_b: &str) -> Ordering {
    score_b
        .cmp(&score_a)
        .then_with(|| trigger_b.len().cmp(&trigger_a.len()))
        .then_with(|| trigger_a.cmp(trigger_b))
}

fn exact_prefix(text: &str, table: &CommandTable) -> Option<ResolvedCommand> {
    for entry in table.iter() {
        let Some(rest) = text.strip_prefix(entry.trigger.as_str()) else {
            continue;
        };
        if !(rest.is_empty() || rest.starts_with(' ')) {
            continue;
        }

        let mut params = entry.descriptor.params.clone();
        if entry.descriptor.dynamic {
            let arg = rest.trim();
            if arg.is_empty() {
                continue;
            }
            params.insert("query".into(), arg.to_owned());
        }

        return Some(ResolvedCommand {
            action: entry.descriptor.action,
            params,
            confidence: 100.0,
            matched_trigger: Some(entry.trigger.clone()),
            tier: MatchTier::Exact,
            rule: None,
            hedged: false,
        });
    }
    None
}

fn rule_fallback(text: &str) -> Option<ResolvedCommand> {
    let (rule, params) = rules::match_rule(text)?;
    Some(ResolvedCommand {
        action: rule.action,
        params,
        confidence: 100.0,
        matched_trigger: None,
        tier: MatchTier::Rule,
        rule: Some(rule.name),
        hedged: false,
    })
}
