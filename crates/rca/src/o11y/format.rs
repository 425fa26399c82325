//! Reshaping of backend query results
//!
//! Loki and Prometheus return `streams`/`matrix` payloads whose raw form is
//! noisy for an LLM. Both are flattened into a list whose first row names
//! the data type, followed by one row per series.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Placeholder returned when a query matched nothing.
pub const NO_DATA_FOUND: &str = "No data found. Try changing the search conditions. \
(A label that does not exist may have been specified. Check the labels.)";

/// Placeholder returned when a metric has no series.
pub const METRIC_NOT_FOUND: &str = "No data found. Try changing the search conditions. \
(A metric that does not exist may have been specified. Check the metric name.)";

/// Placeholder returned when Tempo has no trace for the given ID.
pub const TRACE_NOT_FOUND: &str = "No data exists for the given TraceID.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Log,
    Metric,
}

/// A single `(timestamp, value)` sample or log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub timestamp: Value,
    pub value: Value,
}

/// One row of a reshaped result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultItem {
    DataType {
        data_type: DataType,
    },
    Series {
        labels: BTreeMap<String, String>,
        entries: Vec<Entry>,
    },
    NoData {
        data: String,
    },
}

impl ResultItem {
    pub fn no_data() -> Self {
        ResultItem::NoData {
            data: NO_DATA_FOUND.to_string(),
        }
    }
}

/// Raw `data` section shared by Loki and Prometheus range queries.
#[derive(Debug, Deserialize)]
pub struct QueryData {
    #[serde(rename = "resultType", default)]
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<RawSeries>,
}

/// A series as returned by the backend. Loki names the label set `stream`
/// for log queries and `metric` for metric queries.
#[derive(Debug, Deserialize)]
pub struct RawSeries {
    #[serde(default)]
    pub stream: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub metric: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl RawSeries {
    fn into_item(self) -> ResultItem {
        let labels = self.stream.or(self.metric).unwrap_or_default();
        let entries = self
            .values
            .into_iter()
            .map(|mut pair| {
                let value = if pair.len() > 1 { pair.swap_remove(1) } else { Value::Null };
                let timestamp = pair.into_iter().next().unwrap_or(Value::Null);
                Entry { timestamp, value }
            })
            .collect();
        ResultItem::Series { labels, entries }
    }
}

fn reshape_series(result: Vec<RawSeries>, data_type: DataType) -> Vec<ResultItem> {
    if result.is_empty() {
        return vec![ResultItem::no_data()];
    }

    let mut items = Vec::with_capacity(result.len() + 1);
    items.push(ResultItem::DataType { data_type });
    items.extend(result.into_iter().map(RawSeries::into_item));
    items
}

/// Reshape a log query (`resultType: streams`).
pub fn reshape_streams(result: Vec<RawSeries>) -> Vec<ResultItem> {
    reshape_series(result, DataType::Log)
}

/// Reshape a metric query (`resultType: matrix`).
pub fn reshape_matrix(result: Vec<RawSeries>) -> Vec<ResultItem> {
    reshape_series(result, DataType::Metric)
}

/// Dispatch on the backend's `resultType`. Unknown types yield nothing.
pub fn reshape(data: QueryData) -> Vec<ResultItem> {
    match data.result_type.as_str() {
        "streams" => reshape_streams(data.result),
        "matrix" => reshape_matrix(data.result),
        other => {
            tracing::debug!("Ignoring unsupported result type: {}", other);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> QueryData {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_streams_yield_placeholder() {
        let items = reshape(data(json!({"resultType": "streams", "result": []})));
        assert_eq!(items, vec![ResultItem::no_data()]);
        assert_eq!(
            serde_json::to_value(&items).unwrap(),
            json!([{"data": NO_DATA_FOUND}])
        );
    }

    #[test]
    fn streams_are_flattened() {
        let items = reshape(data(json!({
            "resultType": "streams",
            "result": [{
                "stream": {"pod": "api-0", "namespace": "prod"},
                "values": [["1735689600000000000", "error: connection refused"]]
            }]
        })));

        assert_eq!(
            serde_json::to_value(&items).unwrap(),
            json!([
                {"data_type": "log"},
                {
                    "labels": {"namespace": "prod", "pod": "api-0"},
                    "entries": [{"timestamp": "1735689600000000000", "value": "error: connection refused"}]
                }
            ])
        );
    }

    #[test]
    fn matrix_keeps_numeric_timestamps() {
        let items = reshape(data(json!({
            "resultType": "matrix",
            "result": [{
                "metric": {"__name__": "up", "job": "node"},
                "values": [[1735689600.0, "1"], [1735690200.0, "0"]]
            }]
        })));

        assert_eq!(items[0], ResultItem::DataType { data_type: DataType::Metric });
        match &items[1] {
            ResultItem::Series { labels, entries } => {
                assert_eq!(labels.get("job").map(String::as_str), Some("node"));
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[1].value, json!("0"));
                assert_eq!(entries[1].timestamp, json!(1735690200.0));
            }
            other => panic!("unexpected item: {:?}", other),
        }
    }

    #[test]
    fn unknown_result_type_is_empty() {
        let items = reshape(data(json!({"resultType": "vector", "result": []})));
        assert!(items.is_empty());
    }
}
