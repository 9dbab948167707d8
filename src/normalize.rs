//! Turns free-form model replies into fully populated reports.
//!
//! Everything here is total: any input text, including a provider error,
//! resolves to a record whose every field holds either the model's value or
//! a documented default.

use crate::llm::ProviderError;
use crate::models::{
    BigOReport, CodeMetrics, ComplexityReport, OptimizationReport, Scenarios,
};
use crate::utils::line_count;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

pub const DEFAULT_NOTATION: &str = "O(1)";
pub const NO_ANALYSIS: &str = "No analysis available";
pub const NO_SUGGESTIONS: &str = "No suggestions provided";
const FAILURE_PREFIX: &str = "Analysis failed due to API error: ";

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("invalid JSON in model reply: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("model reply is not a JSON object")]
    NotAnObject,
}

/// A report shape that can be rebuilt from a parsed reply or from a failure.
pub trait Normalize: Sized {
    fn from_reply(reply: &Map<String, Value>, code: &str) -> Self;
    fn fallback(reason: &str, code: &str) -> Self;
}

/// Normalize raw reply text. Malformed replies become the fallback record.
pub fn normalize<T: Normalize>(raw: &str, code: &str) -> T {
    match parse_reply(raw) {
        Ok(reply) => T::from_reply(&reply, code),
        Err(err) => {
            warn!(error = %err, "discarding malformed model reply");
            debug!("raw model reply: {}", raw);
            T::fallback(&err.to_string(), code)
        }
    }
}

/// Normalize the outcome of a provider call, absorbing provider errors.
pub fn normalize_outcome<T: Normalize>(outcome: Result<String, ProviderError>, code: &str) -> T {
    match outcome {
        Ok(raw) => normalize(&raw, code),
        Err(err) => {
            error!(error = %err, "model call failed, returning fallback record");
            T::fallback(&err.to_string(), code)
        }
    }
}

/// Remove an enclosing Markdown code fence (with or without an info string).
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    text = text.trim();
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a reply into a JSON object, tolerating prose around the object.
pub fn parse_reply(raw: &str) -> Result<Map<String, Value>, ReplyError> {
    let text = strip_code_fences(raw);
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(err) => match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str(&text[start..=end]).map_err(|_| ReplyError::Syntax(err))?
            }
            _ => return Err(ReplyError::Syntax(err)),
        },
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ReplyError::NotAnObject),
    }
}

fn failure_text(reason: &str) -> String {
    format!("{FAILURE_PREFIX}{reason}")
}

/// Non-blank string value of `key`.
fn text(reply: &Map<String, Value>, key: &str) -> Option<String> {
    match reply.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn text_or(reply: &Map<String, Value>, key: &str, default: &str) -> String {
    text(reply, key).unwrap_or_else(|| default.to_string())
}

/// Non-negative whole number from a JSON number or numeric string.
fn count(value: Option<&Value>) -> Option<u32> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, u32::MAX as f64) as u32)
}

fn item_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Coerce a list-ish value to a list of text.
///
/// Arrays keep their elements (non-strings rendered as compact JSON), a
/// non-blank scalar becomes a single element, and null, `false`, blank
/// strings or a missing key yield `None`.
fn text_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(items.iter().filter_map(item_text).collect()),
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => item_text(other).map(|s| vec![s]),
    }
}

fn text_list_or_empty(reply: &Map<String, Value>, key: &str) -> Vec<String> {
    text_list(reply.get(key)).unwrap_or_default()
}

impl CodeMetrics {
    fn defaults(code: &str) -> Self {
        Self {
            cyclomatic_complexity: 1,
            cognitive_complexity: 1,
            maintainability_index: 100,
            lines_of_code: line_count(code),
        }
    }

    fn from_value(value: Option<&Value>, code: &str) -> Self {
        let defaults = Self::defaults(code);
        let Some(Value::Object(metrics)) = value else {
            return defaults;
        };
        // Zero is never a meaningful metric; treat it as missing.
        let metric = |key: &str| count(metrics.get(key)).filter(|n| *n > 0);
        Self {
            cyclomatic_complexity: metric("cyclomaticComplexity")
                .unwrap_or(defaults.cyclomatic_complexity),
            cognitive_complexity: metric("cognitiveComplexity")
                .unwrap_or(defaults.cognitive_complexity),
            maintainability_index: metric("maintainabilityIndex")
                .unwrap_or(defaults.maintainability_index),
            lines_of_code: metric("linesOfCode").unwrap_or(defaults.lines_of_code),
        }
    }
}

impl Normalize for ComplexityReport {
    fn from_reply(reply: &Map<String, Value>, code: &str) -> Self {
        Self {
            complexity: count(reply.get("complexityScore")).unwrap_or(0),
            analysis: text_or(reply, "analysis", NO_ANALYSIS),
            suggestions: text_list(reply.get("suggestions"))
                .unwrap_or_else(|| vec![NO_SUGGESTIONS.to_string()]),
            big_o: text_or(reply, "bigO", DEFAULT_NOTATION),
            time_complexity: text_or(reply, "timeComplexity", DEFAULT_NOTATION),
            space_complexity: text_or(reply, "spaceComplexity", DEFAULT_NOTATION),
            metrics: CodeMetrics::from_value(reply.get("metrics"), code),
        }
    }

    fn fallback(reason: &str, code: &str) -> Self {
        Self {
            complexity: 0,
            analysis: failure_text(reason),
            suggestions: vec!["Could not generate suggestions".to_string()],
            big_o: DEFAULT_NOTATION.to_string(),
            time_complexity: DEFAULT_NOTATION.to_string(),
            space_complexity: DEFAULT_NOTATION.to_string(),
            metrics: CodeMetrics::defaults(code),
        }
    }
}

impl Scenarios {
    fn neutral() -> Self {
        Self {
            best_case: DEFAULT_NOTATION.to_string(),
            average_case: DEFAULT_NOTATION.to_string(),
            worst_case: DEFAULT_NOTATION.to_string(),
        }
    }
}

impl Normalize for BigOReport {
    fn from_reply(reply: &Map<String, Value>, _code: &str) -> Self {
        let scenarios = match reply.get("scenarios") {
            Some(Value::Object(s)) => Scenarios {
                best_case: text_or(s, "bestCase", DEFAULT_NOTATION),
                average_case: text_or(s, "averageCase", DEFAULT_NOTATION),
                worst_case: text_or(s, "worstCase", DEFAULT_NOTATION),
            },
            _ => Scenarios::neutral(),
        };
        let detailed_breakdown = match reply.get("detailedBreakdown") {
            Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        };
        Self {
            overall_time_complexity: text_or(reply, "overallTimeComplexity", DEFAULT_NOTATION),
            overall_space_complexity: text_or(reply, "overallSpaceComplexity", DEFAULT_NOTATION),
            detailed_breakdown,
            scenarios,
            explanation: text_or(reply, "explanation", ""),
            bottlenecks: text_list_or_empty(reply, "bottlenecks"),
        }
    }

    fn fallback(reason: &str, _code: &str) -> Self {
        Self {
            overall_time_complexity: DEFAULT_NOTATION.to_string(),
            overall_space_complexity: DEFAULT_NOTATION.to_string(),
            detailed_breakdown: Vec::new(),
            scenarios: Scenarios::neutral(),
            explanation: failure_text(reason),
            bottlenecks: Vec::new(),
        }
    }
}

impl Normalize for OptimizationReport {
    fn from_reply(reply: &Map<String, Value>, _code: &str) -> Self {
        Self {
            improvements: text_list_or_empty(reply, "improvements"),
            performance_optimizations: text_list_or_empty(reply, "performanceOptimizations"),
            memory_optimizations: text_list_or_empty(reply, "memoryOptimizations"),
            algorithm_suggestions: text_list_or_empty(reply, "algorithmSuggestions"),
            best_practices: text_list_or_empty(reply, "bestPractices"),
        }
    }

    fn fallback(_reason: &str, _code: &str) -> Self {
        Self {
            improvements: vec!["Could not generate improvements".to_string()],
            performance_optimizations: vec![
                "Could not generate performance optimizations".to_string()
            ],
            memory_optimizations: vec!["Could not generate memory optimizations".to_string()],
            algorithm_suggestions: vec!["Could not generate algorithm suggestions".to_string()],
            best_practices: vec!["Could not generate best practices".to_string()],
        }
    }
}
