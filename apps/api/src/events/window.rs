use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Day counts offered by the admin period picker. 0 is "Tudo", 1 is "Hoje".
pub const PRESET_DAYS: &[u32] = &[0, 1, 5, 7, 15, 30, 60, 120];

/// The selected reporting period, serialized as its day count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum WindowPreset {
    /// Every record since 2000-01-01.
    AllTime,
    /// Since the start of the current day.
    Today,
    /// Since the start of the day `n` days ago.
    LastDays(u32),
}

impl From<u32> for WindowPreset {
    fn from(days: u32) -> Self {
        match days {
            0 => WindowPreset::AllTime,
            1 => WindowPreset::Today,
            n => WindowPreset::LastDays(n),
        }
    }
}

impl From<WindowPreset> for u32 {
    fn from(preset: WindowPreset) -> Self {
        preset.days()
    }
}

impl WindowPreset {
    pub fn days(self) -> u32 {
        match self {
            WindowPreset::AllTime => 0,
            WindowPreset::Today => 1,
            WindowPreset::LastDays(n) => n,
        }
    }

    pub fn label(self) -> String {
        match self {
            WindowPreset::AllTime => "Tudo".to_string(),
            WindowPreset::Today => "Hoje".to_string(),
            WindowPreset::LastDays(n) => format!("{n} dias"),
        }
    }

    /// Resolves the preset against `now`. The end bound is always `now`.
    pub fn resolve(self, now: DateTime<Utc>) -> DateWindow {
        let floor = all_time_start();
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|n| n.and_utc())
            .unwrap_or(now);
        let start = match self {
            WindowPreset::AllTime => floor,
            WindowPreset::Today => midnight,
            WindowPreset::LastDays(n) => Duration::try_days(i64::from(n))
                .and_then(|d| midnight.checked_sub_signed(d))
                .map_or(floor, |s| s.max(floor)),
        };
        DateWindow { start, end: now }
    }
}

fn all_time_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// An inclusive `[start, end]` timestamp range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}
