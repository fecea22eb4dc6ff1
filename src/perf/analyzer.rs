//! Static query heuristics.
//!
//! Pattern checks against SQL text. Best-effort hints, not a planner.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Tables large enough that an unfiltered scan is worth flagging.
const LARGE_TABLES: &[&str] = &["products", "customers", "orders", "analytics", "audit_logs"];

static WHERE_EQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)WHERE\s+(\w+)\s*=").expect("valid regex"));
static NUMBERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));
static STRING_LITERALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'[^']*'").expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryPlan {
    pub query: String,
    pub estimated_cost: u32,
    pub suggested_indexes: Vec<String>,
    pub optimizations: Vec<String>,
}

pub fn analyze_query(query: &str) -> QueryPlan {
    let lower = query.to_lowercase();
    let mut plan = QueryPlan {
        query: query.to_string(),
        ..QueryPlan::default()
    };

    if lower.contains("select") {
        let large_table = LARGE_TABLES.iter().any(|t| lower.contains(t));
        if large_table && !lower.contains("where") {
            plan.optimizations
                .push("Consider adding WHERE clause to limit results".to_string());
            plan.estimated_cost += 50;
        }

        if query.contains("SELECT *") {
            plan.optimizations
                .push("Consider selecting only needed columns instead of SELECT *".to_string());
            plan.estimated_cost += 10;
        }

        if lower.contains("limit") && !lower.contains("order by") {
            plan.optimizations.push(
                "Consider adding ORDER BY clause with LIMIT for consistent results".to_string(),
            );
            plan.estimated_cost += 5;
        }

        for caps in WHERE_EQ.captures_iter(query) {
            let column = &caps[1];
            plan.suggested_indexes.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{} ON table_name({})",
                column, column
            ));
        }
    }

    if lower.contains("join") {
        plan.optimizations
            .push("Ensure JOIN conditions use indexed columns".to_string());
        plan.estimated_cost += 20;
    }

    plan
}

/// Replaces numbers and string literals with `?` and keeps the first 50 characters.
pub fn normalize_pattern(query: &str) -> String {
    let without_numbers = NUMBERS.replace_all(query, "?");
    let normalized = STRING_LITERALS.replace_all(&without_numbers, "?");
    normalized.chars().take(50).collect()
}
