//! Function-calling definitions handed to the language model.

use serde::Serialize;
use serde_json::json;

use crate::analytics::schema::{AggFn, CategoryColumn, FilterColumn, Metric, TimeDimension};

use super::{
    AGGREGATE_FILTERED, AGGREGATE_SIMPLE_WHERE, AGGREGATE_WITH_GROUPING, PLOT_RELATIONSHIP,
    PLOT_TREND,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: String,
    pub parameters: serde_json::Value,
}

fn names<T>(all: &[T], name: fn(&T) -> &'static str) -> Vec<&'static str> {
    all.iter().map(name).collect()
}

fn function(name: &'static str, description: String, parameters: serde_json::Value) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function",
        function: FunctionDefinition {
            name,
            description,
            parameters,
        },
    }
}

const WHERE_HELP: &str = "Optional row filter WITHOUT the word WHERE, e.g. \
    \"year = 2023 AND product = 'Product 1'\". Columns: dimension columns, metrics and date. \
    Operators: = != < <= > >= IN, BETWEEN, IS [NOT] NULL, combined with AND/OR/NOT and parentheses.";

/// Definitions for every tool, in dispatch order.
pub fn definitions() -> Vec<ToolDefinition> {
    let metrics = names(&Metric::ALL, Metric::column);
    let aggs = names(&AggFn::ALL, AggFn::name);
    let dims = names(&FilterColumn::ALL, FilterColumn::column);
    let times = names(&TimeDimension::ALL, TimeDimension::column);
    let categories = names(&CategoryColumn::ALL, CategoryColumn::column);

    vec![
        function(
            AGGREGATE_SIMPLE_WHERE,
            "Compute one aggregate of a metric over marketing_data, optionally filtered. \
             Returns a single number as text, or \"No results found.\""
                .into(),
            json!({
                "type": "object",
                "properties": {
                    "metric": {"type": "string", "enum": metrics},
                    "agg": {"type": "string", "enum": aggs},
                    "where_clause": {"type": "string", "description": WHERE_HELP}
                },
                "required": ["metric", "agg"]
            }),
        ),
        function(
            AGGREGATE_WITH_GROUPING,
            "Aggregate a metric grouped by a dimension, sorted by the aggregate and \
             optionally limited (top-N). Returns one \"(group, value)\" pair per line."
                .into(),
            json!({
                "type": "object",
                "properties": {
                    "metric": {"type": "string", "enum": metrics},
                    "agg": {"type": "string", "enum": aggs},
                    "group_by": {"type": "string", "enum": dims},
                    "where_clause": {"type": "string", "description": WHERE_HELP},
                    "order_desc": {"type": "boolean", "default": true},
                    "limit": {
                        "type": "integer",
                        "default": 0,
                        "description": "Maximum rows; 0 or negative means no limit."
                    }
                },
                "required": ["metric", "agg"]
            }),
        ),
        function(
            AGGREGATE_FILTERED,
            "Aggregate a metric restricted by exact-match filters on dimension columns. \
             Filter values are matched literally."
                .into(),
            json!({
                "type": "object",
                "properties": {
                    "metric": {"type": "string", "enum": metrics},
                    "agg": {"type": "string", "enum": aggs},
                    "filters": {
                        "type": "object",
                        "description": format!("Map of column to value. Columns: {}", dims.join(", ")),
                        "additionalProperties": {"type": ["string", "integer"]}
                    }
                },
                "required": ["metric", "agg"]
            }),
        ),
        function(
            PLOT_TREND,
            "Sum one or more metrics over a time dimension in chronological order and save \
             the series as CSV and a PNG line chart."
                .into(),
            json!({
                "type": "object",
                "properties": {
                    "metrics": {
                        "type": "string",
                        "description": format!("Comma-separated metrics from: {}", metrics.join(", "))
                    },
                    "time_dimension": {"type": "string", "enum": times},
                    "where_clause": {"type": "string", "description": WHERE_HELP}
                },
                "required": ["metrics", "time_dimension"]
            }),
        ),
        function(
            PLOT_RELATIONSHIP,
            "Scatter one metric against another, optionally split into one series per \
             category value and restricted to a single year."
                .into(),
            json!({
                "type": "object",
                "properties": {
                    "x": {"type": "string", "enum": metrics},
                    "y": {"type": "string", "enum": metrics},
                    "category": {"type": "string", "enum": categories},
                    "year": {"type": "integer"}
                },
                "required": ["x", "y"]
            }),
        ),
    ]
}
