use std::fmt::Display;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::analytics::aggregate::{Buckets, EntityCount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
}

/// Chart-ready parallel arrays: `labels[i]` is drawn with `values[i]`.
/// Pie charts also carry `shares[i]`, the percentage of the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataset {
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<Vec<f64>>,
}

impl ChartDataset {
    pub fn from_pairs(
        kind: ChartKind,
        title: &str,
        pairs: impl IntoIterator<Item = (String, u64)>,
    ) -> Self {
        let (labels, values): (Vec<String>, Vec<u64>) = pairs.into_iter().unzip();
        let shares = (kind == ChartKind::Pie).then(|| shares(&values));
        Self {
            kind,
            title: title.to_string(),
            labels,
            values,
            shares,
        }
    }

    /// Labels and values in bucket order.
    pub fn from_buckets<K: Eq + Hash + Clone + Display>(
        kind: ChartKind,
        title: &str,
        buckets: &Buckets<K>,
    ) -> Self {
        Self::from_pairs(kind, title, buckets.iter().map(|(k, c)| (k.to_string(), c)))
    }

    /// One label per entity, zero counts included, in entity order.
    pub fn from_entities(kind: ChartKind, title: &str, rows: &[EntityCount]) -> Self {
        Self::from_pairs(kind, title, rows.iter().map(|r| (r.label.clone(), r.count)))
    }
}

/// Percentage share of each value. An all-zero dataset has all-zero shares.
fn shares(values: &[u64]) -> Vec<f64> {
    let total: u64 = values.iter().sum();
    if total == 0 {
        return vec![0.0; values.len()];
    }
    values
        .iter()
        .map(|&v| v as f64 * 100.0 / total as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_keep_order_and_zeros() {
        let ds = ChartDataset::from_pairs(
            ChartKind::Bar,
            "Cliques",
            vec![("Ana".into(), 4), ("Bruno".into(), 0), ("Carla".into(), 1)],
        );
        assert_eq!(ds.labels, vec!["Ana", "Bruno", "Carla"]);
        assert_eq!(ds.values, vec![4, 0, 1]);
        assert_eq!(ds.shares, None);
    }

    #[test]
    fn test_entities_with_no_events_render_as_zero() {
        let rows = vec![
            EntityCount { id: 1, label: "Ana".into(), image: None, count: 3 },
            EntityCount { id: 2, label: "Bruno".into(), image: None, count: 0 },
        ];
        let ds = ChartDataset::from_entities(ChartKind::Bar, "Cliques", &rows);
        assert_eq!(ds.labels, vec!["Ana", "Bruno"]);
        assert_eq!(ds.values, vec![3, 0]);
    }

    #[test]
    fn test_buckets_render_in_insertion_order() {
        let mut b = Buckets::new();
        b.increment("endereco".to_string());
        b.increment("blog_view".to_string());
        b.increment("endereco".to_string());
        let ds = ChartDataset::from_buckets(ChartKind::Line, "Tipos", &b);
        assert_eq!(ds.labels, vec!["endereco", "blog_view"]);
        assert_eq!(ds.values, vec![2, 1]);
    }

    #[test]
    fn test_shares_sum_to_hundred() {
        let ds = ChartDataset::from_pairs(
            ChartKind::Pie,
            "WhatsApp",
            vec![("a".into(), 1), ("b".into(), 1), ("c".into(), 2)],
        );
        assert_eq!(ds.shares, Some(vec![25.0, 25.0, 50.0]));
    }

    #[test]
    fn test_all_zero_shares() {
        let ds = ChartDataset::from_pairs(ChartKind::Pie, "x", vec![("a".into(), 0)]);
        assert_eq!(ds.shares, Some(vec![0.0]));
    }
}
