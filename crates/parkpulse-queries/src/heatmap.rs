//! Heatmap reshaping.
//!
//! A heatmap is a transformation over chart output: the multi-dataset
//! `{labels, datasets}` shape becomes `{entities, time_labels, matrix}`.
//! Matrix cells are numeric or null, never strings. LIVE is rejected: a
//! heatmap has no natural time axis for a single instant.

use serde::Serialize;

use parkpulse_core::Period;

use crate::charts::ChartResponse;

/// One heatmap row header.
#[derive(Debug, Clone, Serialize)]
pub struct HeatmapEntity {
    pub entity_id: i32,
    pub entity_name: String,
    pub rank: usize,
    pub total_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub park_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<i32>,
}

/// Full heatmap response.
#[derive(Debug, Clone, Serialize)]
pub struct HeatmapResponse {
    pub success: bool,
    pub period: String,
    pub granularity: String,
    pub metric: String,
    pub metric_unit: String,
    pub timezone: String,
    pub title: String,
    pub entities: Vec<HeatmapEntity>,
    pub time_labels: Vec<String>,
    pub matrix: Vec<Vec<Option<f64>>>,
}

/// Reject LIVE before any chart work happens.
pub fn validate_period(period: Period) -> Result<(), String> {
    if period == Period::Live {
        return Err("heatmap does not support the live period; use today, yesterday, last_week, or last_month".to_string());
    }
    Ok(())
}

/// Reshape a chart response into a heatmap.
///
/// Rows are ranked by their total value, descending; cell nulls are
/// preserved from the chart data.
#[must_use]
pub fn from_chart(
    chart: ChartResponse,
    period: Period,
    metric: &str,
    metric_unit: &str,
    title: &str,
) -> HeatmapResponse {
    let mut ranked: Vec<(f64, crate::charts::ChartDataset)> = chart
        .datasets
        .into_iter()
        .map(|dataset| {
            let total: f64 = dataset.data.iter().flatten().sum();
            (total, dataset)
        })
        .collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut entities = Vec::with_capacity(ranked.len());
    let mut matrix = Vec::with_capacity(ranked.len());

    for (index, (total, dataset)) in ranked.into_iter().enumerate() {
        entities.push(HeatmapEntity {
            entity_id: dataset.entity_id,
            entity_name: dataset.label,
            rank: index + 1,
            total_value: total,
            park_name: dataset.park_name,
            tier: dataset.tier,
        });
        matrix.push(dataset.data);
    }

    HeatmapResponse {
        success: true,
        period: period.as_str().to_string(),
        granularity: chart.granularity,
        metric: metric.to_string(),
        metric_unit: metric_unit.to_string(),
        timezone: "America/Los_Angeles".to_string(),
        title: title.to_string(),
        entities,
        time_labels: chart.labels,
        matrix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartDataset;

    fn chart() -> ChartResponse {
        ChartResponse {
            labels: vec!["6:00".into(), "7:00".into(), "8:00".into()],
            datasets: vec![
                ChartDataset {
                    label: "Kennywood".into(),
                    entity_id: 1,
                    park_name: None,
                    tier: None,
                    data: vec![Some(1.0), None, Some(2.0)],
                },
                ChartDataset {
                    label: "Six Flags Magic Mountain".into(),
                    entity_id: 2,
                    park_name: None,
                    tier: None,
                    data: vec![Some(4.0), Some(3.0), None],
                },
            ],
            chart_type: "park_shame".into(),
            granularity: "hourly".into(),
        }
    }

    #[test]
    fn test_live_period_rejected() {
        assert!(validate_period(Period::Live).is_err());
        for period in [
            Period::Today,
            Period::Yesterday,
            Period::LastWeek,
            Period::LastMonth,
        ] {
            assert!(validate_period(period).is_ok());
        }
    }

    #[test]
    fn test_matrix_rows_align_with_entities() {
        let heatmap = from_chart(chart(), Period::Today, "shame_score", "score", "Shame by hour");
        assert_eq!(heatmap.entities.len(), 2);
        assert_eq!(heatmap.matrix.len(), 2);
        assert_eq!(heatmap.time_labels.len(), 3);

        // Ranked by total: Six Flags (7.0) above Kennywood (3.0)
        assert_eq!(heatmap.entities[0].entity_name, "Six Flags Magic Mountain");
        assert_eq!(heatmap.entities[0].rank, 1);
        assert_eq!(heatmap.entities[1].rank, 2);
        assert_eq!(heatmap.matrix[0], vec![Some(4.0), Some(3.0), None]);
    }

    #[test]
    fn test_nulls_survive_reshaping() {
        let heatmap = from_chart(chart(), Period::Today, "shame_score", "score", "t");
        // The null cell stays null, not zero
        assert_eq!(heatmap.matrix[1][1], None);
    }

    #[test]
    fn test_heatmap_serializes_null_cells() {
        let heatmap = from_chart(chart(), Period::Today, "shame_score", "score", "t");
        let value = serde_json::to_value(&heatmap).unwrap();
        assert_eq!(value["matrix"][1][1], serde_json::Value::Null);
        assert_eq!(value["success"], true);
        assert_eq!(value["period"], "today");
    }
}
