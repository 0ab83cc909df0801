//! Row filters for the hosted backend's REST dialect.
//!
//! A `RowQuery` is built once and consumed two ways: `to_params` renders it as
//! PostgREST query parameters for the HTTP store, and the in-memory test store
//! walks `filters()` directly so both agree on semantics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, String),
    Gte(String, String),
    Lte(String, String),
    /// Matches when any inner filter matches.
    Or(Vec<Filter>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowQuery {
    filters: Vec<Filter>,
    order: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl RowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Eq(column.to_string(), value.to_string()));
        self
    }

    pub fn gte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Gte(column.to_string(), value.to_string()));
        self
    }

    pub fn lte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Lte(column.to_string(), value.to_string()));
        self
    }

    pub fn any_of(mut self, filters: Vec<Filter>) -> Self {
        self.filters.push(Filter::Or(filters));
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn order(&self) -> Option<(&str, Direction)> {
        self.order.as_ref().map(|(c, d)| (c.as_str(), *d))
    }

    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    /// True when the query carries no row filter at all.
    /// The HTTP store refuses unfiltered deletes and updates.
    pub fn is_unfiltered(&self) -> bool {
        self.filters.is_empty()
    }

    /// Renders the query as PostgREST parameters, e.g.
    /// `[("tipo", "eq.blog_view"), ("timestamp", "gte.2024-01-01T00:00:00Z")]`.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 2);
        for filter in &self.filters {
            params.push(match filter {
                Filter::Or(inner) => ("or".to_string(), format!("({})", render_group(inner))),
                Filter::Eq(c, _) | Filter::Gte(c, _) | Filter::Lte(c, _) => {
                    (c.clone(), render_operator(filter))
                }
            });
        }
        if let Some((column, direction)) = &self.order {
            let dir = match direction {
                Direction::Asc => "asc",
                Direction::Desc => "desc",
            };
            params.push(("order".to_string(), format!("{column}.{dir}")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// `eq.v`, `gte.v`, `lte.v`: the right-hand side of a column param.
fn render_operator(filter: &Filter) -> String {
    match filter {
        Filter::Eq(_, v) => format!("eq.{}", quote(v)),
        Filter::Gte(_, v) => format!("gte.{}", quote(v)),
        Filter::Lte(_, v) => format!("lte.{}", quote(v)),
        Filter::Or(inner) => format!("or({})", render_group(inner)),
    }
}

/// Inside `or=(...)` each term is written `column.op.value`.
fn render_group(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(|f| match f {
            Filter::Eq(c, _) | Filter::Gte(c, _) | Filter::Lte(c, _) => {
                format!("{c}.{}", render_operator(f))
            }
            Filter::Or(_) => render_operator(f),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Values containing PostgREST reserved characters are double-quoted.
fn quote(value: &str) -> String {
    if value.contains([',', '(', ')', '"']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
