use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "javascript";

/// Language tags offered by the client, with their display names.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("javascript", "JavaScript"),
    ("python", "Python"),
    ("java", "Java"),
    ("csharp", "C#"),
    ("cpp", "C++"),
    ("go", "Go"),
];

/// Body accepted by every analysis endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Result of `/api/calculate`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityReport {
    pub complexity: u32,

    pub analysis: String,

    pub suggestions: Vec<String>,

    #[serde(rename = "bigO")]
    pub big_o: String,

    pub time_complexity: String,

    pub space_complexity: String,

    pub metrics: CodeMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeMetrics {
    pub cyclomatic_complexity: u32,

    pub cognitive_complexity: u32,

    pub maintainability_index: u32,

    pub lines_of_code: u32,
}

/// Result of `/api/bigO-analysis`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BigOReport {
    pub overall_time_complexity: String,

    pub overall_space_complexity: String,

    /// Per-function breakdown; element shape is chosen by the model.
    pub detailed_breakdown: Vec<serde_json::Value>,

    pub scenarios: Scenarios,

    pub explanation: String,

    pub bottlenecks: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenarios {
    pub best_case: String,

    pub average_case: String,

    pub worst_case: String,
}

/// Result of `/api/optimize`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationReport {
    pub improvements: Vec<String>,

    pub performance_optimizations: Vec<String>,

    pub memory_optimizations: Vec<String>,

    pub algorithm_suggestions: Vec<String>,

    pub best_practices: Vec<String>,
}

/// One row of the client-side session history.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: String,

    pub complexity: u32,

    #[serde(rename = "bigO")]
    pub big_o: String,

    pub code_snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn complexity_report_uses_wire_names() {
        let report = ComplexityReport {
            complexity: 12,
            analysis: "fine".into(),
            suggestions: vec![],
            big_o: "O(n)".into(),
            time_complexity: "O(n)".into(),
            space_complexity: "O(1)".into(),
            metrics: CodeMetrics {
                cyclomatic_complexity: 2,
                cognitive_complexity: 3,
                maintainability_index: 90,
                lines_of_code: 4,
            },
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["bigO"], "O(n)");
        assert_eq!(value["timeComplexity"], "O(n)");
        assert_eq!(value["metrics"]["linesOfCode"], 4);
        assert_eq!(value["metrics"]["maintainabilityIndex"], 90);
    }

    #[test]
    fn request_tolerates_missing_fields() {
        let req: AnalysisRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.code.is_none());
        assert!(req.language.is_none());

        let body = serde_json::to_value(AnalysisRequest {
            code: Some("x".into()),
            language: None,
        })
        .unwrap();
        assert_eq!(body, json!({"code": "x"}));
    }
}
