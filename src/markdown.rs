use crate::client::History;
use crate::models::{BigOReport, ComplexityReport, OptimizationReport};
use anyhow::Result;
use tracing::info;

/// Severity band for a 0-100 complexity score.
pub fn complexity_band(score: u32) -> &'static str {
    if score < 30 {
        "low"
    } else if score < 70 {
        "medium"
    } else {
        "high"
    }
}

/// Rough rating of a Big-O label.
pub fn big_o_band(notation: &str) -> &'static str {
    if notation.is_empty() || notation.contains("O(1)") || notation.contains("O(log") {
        "low"
    } else if notation.contains("O(n)") {
        "medium"
    } else if notation.contains("O(n²)") || notation.contains("O(n^2)") || notation.contains("O(2^n)") {
        "high"
    } else {
        "medium"
    }
}

fn push_list(md: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    md.push_str(&format!("### {}\n\n", title));
    for item in items {
        md.push_str(&format!("- {}\n", item));
    }
    md.push('\n');
}

pub fn render_complexity(report: &ComplexityReport, language: &str) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Code complexity ({})\n\n", language));
    md.push_str(&format!(
        "**Complexity score:** {}/100 ({})\n\n",
        report.complexity,
        complexity_band(report.complexity)
    ));
    md.push_str("| Measure | Value | Rating |\n|---|---|---|\n");
    for (label, value) in [
        ("Big O", &report.big_o),
        ("Time complexity", &report.time_complexity),
        ("Space complexity", &report.space_complexity),
    ] {
        md.push_str(&format!("| {} | {} | {} |\n", label, value, big_o_band(value)));
    }
    md.push('\n');

    md.push_str("## Analysis\n\n");
    md.push_str(&format!("{}\n\n", report.analysis));

    if !report.suggestions.is_empty() {
        md.push_str("## Suggestions\n\n");
        for (i, suggestion) in report.suggestions.iter().enumerate() {
            md.push_str(&format!("{}. {}\n", i + 1, suggestion));
        }
        md.push('\n');
    }

    let m = &report.metrics;
    md.push_str("## Metrics\n\n");
    md.push_str("| Metric | Value |\n|---|---|\n");
    md.push_str(&format!("| Cyclomatic complexity | {} |\n", m.cyclomatic_complexity));
    md.push_str(&format!("| Cognitive complexity | {} |\n", m.cognitive_complexity));
    md.push_str(&format!("| Maintainability index | {} |\n", m.maintainability_index));
    md.push_str(&format!("| Lines of code | {} |\n\n", m.lines_of_code));
    md
}

pub fn render_big_o(report: &BigOReport) -> String {
    let mut md = String::new();
    md.push_str("# Detailed Big O analysis\n\n");
    md.push_str(&format!("- Time complexity: {}\n", report.overall_time_complexity));
    md.push_str(&format!("- Space complexity: {}\n\n", report.overall_space_complexity));
    md.push_str("### Scenarios\n\n");
    md.push_str(&format!("- Best: {}\n", report.scenarios.best_case));
    md.push_str(&format!("- Average: {}\n", report.scenarios.average_case));
    md.push_str(&format!("- Worst: {}\n\n", report.scenarios.worst_case));
    if !report.explanation.is_empty() {
        md.push_str(&format!("{}\n\n", report.explanation));
    }
    if !report.detailed_breakdown.is_empty() {
        md.push_str("### Breakdown\n\n");
        for entry in &report.detailed_breakdown {
            match entry.as_str() {
                Some(text) => md.push_str(&format!("- {}\n", text)),
                None => md.push_str(&format!("- `{}`\n", entry)),
            }
        }
        md.push('\n');
    }
    push_list(&mut md, "Performance bottlenecks", &report.bottlenecks);
    md
}

pub fn render_optimizations(report: &OptimizationReport) -> String {
    let mut md = String::new();
    md.push_str("# Optimization suggestions\n\n");
    push_list(&mut md, "🔧 Code improvements", &report.improvements);
    push_list(&mut md, "⚡ Performance optimizations", &report.performance_optimizations);
    push_list(&mut md, "💾 Memory optimizations", &report.memory_optimizations);
    push_list(&mut md, "🧠 Algorithm improvements", &report.algorithm_suggestions);
    push_list(&mut md, "✅ Best practices", &report.best_practices);
    md
}

pub fn render_history(history: &History) -> String {
    let mut md = String::new();
    md.push_str("# Analysis history\n\n");
    if history.is_empty() {
        md.push_str("No analyses yet.\n");
        return md;
    }
    md.push_str("| Time | Score | Big O | Snippet |\n|---|---|---|---|\n");
    for entry in history.entries() {
        md.push_str(&format!(
            "| {} | {} ({}) | {} | `{}` |\n",
            entry.timestamp,
            entry.complexity,
            complexity_band(entry.complexity),
            entry.big_o,
            entry.code_snippet.replace('\n', " ").replace('|', "\\|")
        ));
    }
    md
}

pub fn write_report(content: &str, output_path: &str) -> Result<()> {
    std::fs::write(output_path, content)?;
    info!("Report written to {}", output_path);
    Ok(())
}
