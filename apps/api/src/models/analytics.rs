use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub const ANALYTICS_TABLE: &str = "analytics";

/// Interaction type tags written by the public site.
pub mod kinds {
    pub const SCHEDULE_BUTTON: &str = "agendar_massagem";
    pub const WHATSAPP_FOOTER: &str = "whatsapp_footer";
    pub const WHATSAPP_FLOATING: &str = "whatsapp_flutuante";
    pub const BLOG_VIEW: &str = "blog_view";
    pub const PROFESSIONAL_VIEW: &str = "profissional_view";
    pub const PROFESSIONAL_CLICK: &str = "profissional_click";
    pub const PROFESSIONAL_WHATSAPP: &str = "profissional_whatsapp";
    pub const SERVICE_VIEW: &str = "servico_view";
    pub const SERVICE_WHATSAPP: &str = "servico_whatsapp";
    pub const HOME_SERVICES: &str = "servicos_superior";
    pub const HOME_PROFESSIONALS: &str = "profissionais_superior";
    pub const ADDRESS: &str = "endereco";
}

/// Foreign-key columns on the analytics table.
pub const PROFESSIONAL_COLUMN: &str = "profissional_id";
pub const POST_COLUMN: &str = "post_id";
pub const SERVICE_COLUMN: &str = "servico_id";

/// Which foreign column a given type tag references, if any.
pub fn foreign_column_for(kind: &str) -> Option<&'static str> {
    if kind.starts_with("profissional_") {
        Some(PROFESSIONAL_COLUMN)
    } else if kind.starts_with("blog_") {
        Some(POST_COLUMN)
    } else if kind.starts_with("servico_") {
        Some(SERVICE_COLUMN)
    } else {
        None
    }
}

/// An analytics row exactly as the backend returns it. Nothing here is trusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEventRow {
    pub id: Option<Value>,
    pub tipo: Option<String>,
    pub timestamp: Option<String>,
    pub profissional_id: Option<i64>,
    pub post_id: Option<i64>,
    pub servico_id: Option<i64>,
}

/// A validated interaction record. The only event shape the aggregator accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub kind: String,
    pub foreign_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowRejection {
    #[error("missing or empty type tag")]
    MissingKind,

    #[error("missing timestamp")]
    MissingTimestamp,

    #[error("unparseable timestamp '{0}'")]
    BadTimestamp(String),
}

impl TryFrom<RawEventRow> for EventRecord {
    type Error = RowRejection;

    fn try_from(row: RawEventRow) -> Result<Self, Self::Error> {
        let kind = row
            .tipo
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(RowRejection::MissingKind)?;
        let raw_ts = row.timestamp.ok_or(RowRejection::MissingTimestamp)?;
        let timestamp = parse_timestamp(&raw_ts).ok_or(RowRejection::BadTimestamp(raw_ts))?;
        // A type tag that names a column reads only that column. Untagged
        // kinds take whichever foreign column is set.
        let foreign_id = match foreign_column_for(&kind) {
            Some(PROFESSIONAL_COLUMN) => row.profissional_id,
            Some(POST_COLUMN) => row.post_id,
            Some(_) => row.servico_id,
            None => row.profissional_id.or(row.post_id).or(row.servico_id),
        };
        Ok(EventRecord {
            kind,
            foreign_id,
            timestamp,
        })
    }
}

/// Accepts RFC 3339 (`timestamptz`) and zone-less ISO-8601 (`timestamp`, read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// A new interaction reported by the public site.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub kind: String,
    pub foreign_id: Option<i64>,
}

impl NewEvent {
    /// Builds the analytics row, placing `foreign_id` in the column its type implies.
    /// Errors are user-facing validation messages.
    pub fn to_row(&self, now: DateTime<Utc>) -> Result<Value, String> {
        let kind = self.kind.trim();
        if kind.is_empty() {
            return Err("kind is required".to_string());
        }
        if !kind
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(format!(
                "kind '{kind}' may only contain lowercase letters, digits and underscores"
            ));
        }
        let mut row = json!({
            "tipo": kind,
            "timestamp": now.to_rfc3339(),
        });
        match (self.foreign_id, foreign_column_for(kind)) {
            (Some(id), Some(column)) => row[column] = json!(id),
            (Some(_), None) => {
                return Err(format!("kind '{kind}' does not reference an entity"));
            }
            (None, _) => {}
        }
        Ok(row)
    }
}
