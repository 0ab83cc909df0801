//! Dashboard composition. Joins window-scoped counts with entity metadata.
//!
//! `compose_site_dashboard` is pure: it takes already-fetched records and
//! entities and produces a `SiteDashboard` whose equality is a deep value
//! comparison (the poller relies on this to skip no-op refreshes).
//! `SiteDashboard::view` then renders one tab into cards and charts.

use serde::{Deserialize, Serialize};

use crate::analytics::aggregate::{
    count_by_day, count_by_foreign_id, count_kinds, join_entities, EntityCount,
};
use crate::analytics::chart::{ChartDataset, ChartKind};
use crate::backend::ObjectStore;
use crate::events::window::WindowPreset;
use crate::models::analytics::{kinds, EventRecord};
use crate::models::content::{EntityKind, EntityMeta, PostRow, ProfessionalRow, ServiceRow};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DashboardTab {
    #[serde(rename = "whatsapp")]
    WhatsApp,
    #[serde(rename = "blog")]
    Blog,
    #[serde(rename = "profissionais")]
    Professionals,
    #[serde(rename = "servicos")]
    Services,
    #[default]
    #[serde(rename = "home")]
    Home,
}

/// Entity metadata fetched alongside the event records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityMetadata {
    pub professionals: Vec<ProfessionalRow>,
    pub posts: Vec<PostRow>,
    pub services: Vec<ServiceRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonClicks {
    /// Card title, e.g. "Menu Inferior".
    pub location: String,
    /// Human-readable placement shown under the count.
    pub description: String,
    pub kind: String,
    pub clicks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityStats {
    pub id: i64,
    pub name: String,
    pub image_url: Option<String>,
    pub clicks: u64,
    pub whatsapp_clicks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyClicks {
    pub day: chrono::NaiveDate,
    pub clicks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapClicks {
    pub google: u64,
    /// No event type exists for Waze; always 0.
    pub waze: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeStats {
    pub buttons: Vec<ButtonClicks>,
    pub maps: MapClicks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteDashboard {
    pub window: WindowPreset,
    pub whatsapp: Vec<ButtonClicks>,
    pub whatsapp_daily: Vec<DailyClicks>,
    pub blog: Vec<EntityStats>,
    pub professionals: Vec<EntityStats>,
    pub services: Vec<EntityStats>,
    pub home: HomeStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub title: String,
    pub value: u64,
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// One tab rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabView {
    pub tab: DashboardTab,
    pub window: WindowPreset,
    pub window_label: String,
    pub cards: Vec<Card>,
    pub charts: Vec<ChartDataset>,
}

const WHATSAPP_BUTTONS: &[(&str, &str, &str)] = &[
    ("Botão Agendamento", "Agende uma Massagem", kinds::SCHEDULE_BUTTON),
    ("Menu Inferior", "whatsapp no rodapé", kinds::WHATSAPP_FOOTER),
    ("Botão Flutuante", "WhatsApp flutuante lateral", kinds::WHATSAPP_FLOATING),
];

const HOME_BUTTONS: &[(&str, &str, &str)] = &[
    ("servicos_superior", "Nossos Serviços", kinds::HOME_SERVICES),
    ("profissionais_superior", "Profissionais", kinds::HOME_PROFESSIONALS),
];

// ────────────────────────────────────────────────────────────────────────────
// Composition
// ────────────────────────────────────────────────────────────────────────────

/// Builds the full dashboard for `records`, which must already be limited to `window`.
pub fn compose_site_dashboard(
    window: WindowPreset,
    records: &[EventRecord],
    entities: &EntityMetadata,
    storage: &dyn ObjectStore,
) -> SiteDashboard {
    let whatsapp = button_clicks(records, WHATSAPP_BUTTONS);

    let whatsapp_kinds: Vec<&str> = WHATSAPP_BUTTONS.iter().map(|(_, _, k)| *k).collect();
    let whatsapp_records: Vec<EventRecord> = records
        .iter()
        .filter(|r| whatsapp_kinds.contains(&r.kind.as_str()))
        .cloned()
        .collect();
    let whatsapp_daily = count_by_day(&whatsapp_records)
        .iter()
        .map(|(day, clicks)| DailyClicks { day: *day, clicks })
        .collect();

    SiteDashboard {
        window,
        whatsapp,
        whatsapp_daily,
        blog: entity_stats(EntityKind::Post, &entities.posts, records, storage),
        professionals: entity_stats(
            EntityKind::Professional,
            &entities.professionals,
            records,
            storage,
        ),
        services: entity_stats(EntityKind::Service, &entities.services, records, storage),
        home: HomeStats {
            buttons: button_clicks(records, HOME_BUTTONS),
            maps: MapClicks {
                google: count_kinds(records, &[kinds::ADDRESS]),
                waze: 0,
            },
        },
    }
}

fn button_clicks(records: &[EventRecord], buttons: &[(&str, &str, &str)]) -> Vec<ButtonClicks> {
    buttons
        .iter()
        .map(|(location, description, kind)| ButtonClicks {
            location: location.to_string(),
            description: description.to_string(),
            kind: kind.to_string(),
            clicks: count_kinds(records, &[*kind]),
        })
        .collect()
}

/// Click and WhatsApp counts per entity, zero-filled, in entity order.
pub fn entity_stats<E: EntityMeta>(
    kind: EntityKind,
    entities: &[E],
    records: &[EventRecord],
    storage: &dyn ObjectStore,
) -> Vec<EntityStats> {
    let clicks = join_entities(entities, &count_by_foreign_id(records, kind.click_kinds()));
    let whatsapp = join_entities(entities, &count_by_foreign_id(records, kind.whatsapp_kinds()));
    clicks
        .into_iter()
        .zip(whatsapp)
        .map(|(c, w): (EntityCount, EntityCount)| EntityStats {
            id: c.id,
            image_url: c
                .image
                .as_deref()
                .map(|path| storage.public_url(kind.bucket(), path)),
            name: c.label,
            clicks: c.count,
            whatsapp_clicks: w.count,
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tab rendering
// ────────────────────────────────────────────────────────────────────────────

impl SiteDashboard {
    pub fn view(&self, tab: DashboardTab) -> TabView {
        let (cards, charts) = match tab {
            DashboardTab::WhatsApp => self.whatsapp_tab(),
            DashboardTab::Blog => self.blog_tab(),
            DashboardTab::Professionals => self.professionals_tab(),
            DashboardTab::Services => self.services_tab(),
            DashboardTab::Home => self.home_tab(),
        };
        TabView {
            tab,
            window: self.window,
            window_label: self.window.label(),
            cards,
            charts,
        }
    }

    fn whatsapp_tab(&self) -> (Vec<Card>, Vec<ChartDataset>) {
        let cards = self
            .whatsapp
            .iter()
            .map(|b| Card {
                title: "Total de cliques".to_string(),
                value: b.clicks,
                caption: b.description.clone(),
                image_url: None,
            })
            .collect();
        let charts = vec![
            ChartDataset::from_pairs(
                ChartKind::Pie,
                "Distribuição de cliques por botão",
                self.whatsapp.iter().map(|b| (b.description.clone(), b.clicks)),
            ),
            ChartDataset::from_pairs(
                ChartKind::Line,
                "Cliques no WhatsApp por dia",
                self.whatsapp_daily
                    .iter()
                    .map(|d| (d.day.format("%d/%m").to_string(), d.clicks)),
            ),
        ];
        (cards, charts)
    }

    fn blog_tab(&self) -> (Vec<Card>, Vec<ChartDataset>) {
        let cards = entity_cards(&self.blog, "Total de visualizações", |e| e.clicks);
        let charts = vec![
            ChartDataset::from_pairs(
                ChartKind::Pie,
                "Distribuição de visualizações por post",
                self.blog.iter().map(|e| (e.name.clone(), e.clicks)),
            ),
            ChartDataset::from_pairs(
                ChartKind::Bar,
                "Visualizações por post",
                self.blog.iter().map(|e| (e.name.clone(), e.clicks)),
            ),
        ];
        (cards, charts)
    }

    fn professionals_tab(&self) -> (Vec<Card>, Vec<ChartDataset>) {
        let cards = entity_cards(&self.professionals, "Cliques no perfil", |e| e.clicks);
        let charts = vec![
            ChartDataset::from_pairs(
                ChartKind::Pie,
                "Distribuição de interações por profissional",
                self.professionals
                    .iter()
                    .map(|e| (e.name.clone(), e.clicks + e.whatsapp_clicks)),
            ),
            ChartDataset::from_pairs(
                ChartKind::Pie,
                "Distribuição de cliques no WhatsApp por profissional",
                self.professionals
                    .iter()
                    .map(|e| (e.name.clone(), e.whatsapp_clicks)),
            ),
            ChartDataset::from_pairs(
                ChartKind::Bar,
                "Cliques por profissional",
                self.professionals.iter().map(|e| (e.name.clone(), e.clicks)),
            ),
        ];
        (cards, charts)
    }

    fn services_tab(&self) -> (Vec<Card>, Vec<ChartDataset>) {
        let cards = entity_cards(&self.services, "Visualizações", |e| e.clicks);
        let charts = vec![
            ChartDataset::from_pairs(
                ChartKind::Pie,
                "Distribuição de interações por serviço",
                self.services
                    .iter()
                    .map(|e| (e.name.clone(), e.clicks + e.whatsapp_clicks)),
            ),
            ChartDataset::from_pairs(
                ChartKind::Bar,
                "Cliques no WhatsApp por serviço",
                self.services
                    .iter()
                    .map(|e| (e.name.clone(), e.whatsapp_clicks)),
            ),
        ];
        (cards, charts)
    }

    fn home_tab(&self) -> (Vec<Card>, Vec<ChartDataset>) {
        let mut pairs: Vec<(String, u64)> = self
            .home
            .buttons
            .iter()
            .map(|b| (b.description.clone(), b.clicks))
            .collect();
        pairs.push(("Endereço".to_string(), self.home.maps.google));

        let cards = pairs
            .iter()
            .map(|(label, clicks)| Card {
                title: "Total de cliques".to_string(),
                value: *clicks,
                caption: label.clone(),
                image_url: None,
            })
            .collect();
        let charts = vec![
            ChartDataset::from_pairs(
                ChartKind::Pie,
                "Distribuição de interações na página inicial",
                pairs.clone(),
            ),
            ChartDataset::from_pairs(ChartKind::Bar, "Cliques na página inicial", pairs),
        ];
        (cards, charts)
    }
}

fn entity_cards(rows: &[EntityStats], title: &str, value: impl Fn(&EntityStats) -> u64) -> Vec<Card> {
    rows.iter()
        .map(|e| Card {
            title: title.to_string(),
            value: value(e),
            caption: e.name.clone(),
            image_url: e.image_url.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryObjects;
    use crate::events::window::WindowPreset;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn rec(kind: &str, id: Option<i64>, days_ago: i64) -> EventRecord {
        EventRecord {
            kind: kind.to_string(),
            foreign_id: id,
            timestamp: now() - Duration::days(days_ago),
        }
    }

    fn professional(id: i64, nome: &str, imagem: &str) -> ProfessionalRow {
        ProfessionalRow {
            id,
            nome: nome.to_string(),
            imagens: vec![imagem.to_string()],
            especialidades: vec![],
            descricao: None,
            ativo: Some(true),
        }
    }

    fn in_window(preset: WindowPreset, records: Vec<EventRecord>) -> Vec<EventRecord> {
        let w = preset.resolve(now());
        records.into_iter().filter(|r| w.contains(r.timestamp)).collect()
    }

    #[test]
    fn test_whatsapp_card_counts_only_in_window() {
        let records = vec![
            rec(kinds::WHATSAPP_FOOTER, None, 0),
            rec(kinds::WHATSAPP_FOOTER, None, 2),
            rec(kinds::WHATSAPP_FOOTER, None, 6),
            rec(kinds::WHATSAPP_FOOTER, None, 20),
            rec(kinds::WHATSAPP_FOOTER, None, 400),
        ];
        let preset = WindowPreset::LastDays(7);
        let d = compose_site_dashboard(
            preset,
            &in_window(preset, records),
            &EntityMetadata::default(),
            &MemoryObjects::default(),
        );
        let footer = d.whatsapp.iter().find(|b| b.location == "Menu Inferior").unwrap();
        assert_eq!(footer.clicks, 3);
        assert_eq!(d.whatsapp_daily.iter().map(|x| x.clicks).sum::<u64>(), 3);
    }

    #[test]
    fn test_professionals_zero_filled_and_orphans_ignored() {
        let entities = EntityMetadata {
            professionals: vec![
                professional(1, "Ana", "ana.jpg"),
                professional(2, "Bia", "https://cdn.example.com/bia.jpg"),
            ],
            ..Default::default()
        };
        let records = vec![
            rec(kinds::PROFESSIONAL_CLICK, Some(1), 0),
            rec(kinds::PROFESSIONAL_WHATSAPP, Some(1), 0),
            rec(kinds::PROFESSIONAL_CLICK, Some(5), 0), // professional 5 was deleted
        ];
        let d = compose_site_dashboard(
            WindowPreset::Today,
            &records,
            &entities,
            &MemoryObjects::default(),
        );
        assert_eq!(d.professionals.len(), 2);
        assert_eq!((d.professionals[0].clicks, d.professionals[0].whatsapp_clicks), (1, 1));
        assert_eq!((d.professionals[1].clicks, d.professionals[1].whatsapp_clicks), (0, 0));
        assert!(d.professionals.iter().all(|p| p.id != 5));
        assert_eq!(
            d.professionals[0].image_url.as_deref(),
            Some("https://backend.test/storage/v1/object/public/profissionais/ana.jpg")
        );
        assert_eq!(
            d.professionals[1].image_url.as_deref(),
            Some("https://cdn.example.com/bia.jpg")
        );

        let view = d.view(DashboardTab::Professionals);
        assert_eq!(view.charts[2].labels, vec!["Ana", "Bia"]);
        assert_eq!(view.charts[2].values, vec![1, 0]);
    }

    #[test]
    fn test_click_with_only_a_post_column_is_not_a_professional_click() {
        use crate::models::analytics::RawEventRow;

        let row = RawEventRow {
            tipo: Some(kinds::PROFESSIONAL_CLICK.to_string()),
            timestamp: Some(now().to_rfc3339()),
            post_id: Some(1),
            ..Default::default()
        };
        let records = vec![EventRecord::try_from(row).unwrap()];
        let entities = EntityMetadata {
            professionals: vec![professional(1, "Ana", "ana.jpg")],
            ..Default::default()
        };
        let d = compose_site_dashboard(
            WindowPreset::AllTime,
            &records,
            &entities,
            &MemoryObjects::default(),
        );
        assert_eq!(d.professionals[0].clicks, 0);
    }

    #[test]
    fn test_home_tab_includes_address_clicks() {
        let records = vec![
            rec(kinds::HOME_SERVICES, None, 0),
            rec(kinds::ADDRESS, None, 0),
            rec(kinds::ADDRESS, None, 0),
        ];
        let d = compose_site_dashboard(
            WindowPreset::AllTime,
            &records,
            &EntityMetadata::default(),
            &MemoryObjects::default(),
        );
        assert_eq!(d.home.maps.google, 2);
        assert_eq!(d.home.maps.waze, 0);
        let view = d.view(DashboardTab::Home);
        assert_eq!(view.charts[0].labels, vec!["Nossos Serviços", "Profissionais", "Endereço"]);
        assert_eq!(view.charts[0].values, vec![1, 0, 2]);
        assert_eq!(view.window_label, "Tudo");
    }

    #[test]
    fn test_composition_is_deterministic() {
        let records = vec![rec(kinds::BLOG_VIEW, Some(7), 0)];
        let objects = MemoryObjects::default();
        let a = compose_site_dashboard(WindowPreset::Today, &records, &EntityMetadata::default(), &objects);
        let b = compose_site_dashboard(WindowPreset::Today, &records, &EntityMetadata::default(), &objects);
        assert_eq!(a, b);
    }

    #[test]
    fn test_tab_names_match_query_values() {
        let tab: DashboardTab = serde_json::from_str("\"profissionais\"").unwrap();
        assert_eq!(tab, DashboardTab::Professionals);
        assert_eq!(DashboardTab::default(), DashboardTab::Home);
    }
}
