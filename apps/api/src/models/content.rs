use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::analytics::{
    kinds, POST_COLUMN, PROFESSIONAL_COLUMN, SERVICE_COLUMN,
};

/// The three kinds of business content the admin manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Professional,
    Post,
    Service,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Professional => "profissionais",
            EntityKind::Post => "blog_posts",
            EntityKind::Service => "servicos",
        }
    }

    /// Storage bucket holding this kind's images.
    pub fn bucket(self) -> &'static str {
        match self {
            EntityKind::Professional => "profissionais",
            EntityKind::Post => "posts",
            EntityKind::Service => "servicos",
        }
    }

    /// Column on the analytics table that references this kind.
    pub fn analytics_column(self) -> &'static str {
        match self {
            EntityKind::Professional => PROFESSIONAL_COLUMN,
            EntityKind::Post => POST_COLUMN,
            EntityKind::Service => SERVICE_COLUMN,
        }
    }

    /// Type tags counted as "views/clicks" of a single entity.
    pub fn click_kinds(self) -> &'static [&'static str] {
        match self {
            EntityKind::Professional => &[kinds::PROFESSIONAL_CLICK],
            EntityKind::Post => &[kinds::BLOG_VIEW],
            EntityKind::Service => &[kinds::SERVICE_VIEW],
        }
    }

    /// Type tags counted as WhatsApp contacts started from an entity page.
    pub fn whatsapp_kinds(self) -> &'static [&'static str] {
        match self {
            EntityKind::Professional => &[kinds::PROFESSIONAL_WHATSAPP],
            EntityKind::Post => &[],
            EntityKind::Service => &[kinds::SERVICE_WHATSAPP],
        }
    }
}

/// Display fields every entity exposes to the dashboard join.
pub trait EntityMeta {
    fn id(&self) -> i64;
    fn display_name(&self) -> &str;
    /// First stored image reference: a storage path or an absolute URL.
    fn image_ref(&self) -> Option<&str>;
    fn is_active(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalRow {
    pub id: i64,
    pub nome: String,
    #[serde(default)]
    pub imagens: Vec<String>,
    #[serde(default)]
    pub especialidades: Vec<String>,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub ativo: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRow {
    pub id: i64,
    pub titulo: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub imagem: Option<String>,
    #[serde(default)]
    pub duracao: Option<i32>,
    #[serde(default)]
    pub ativo: Option<bool>,
}

impl EntityMeta for ProfessionalRow {
    fn id(&self) -> i64 {
        self.id
    }
    fn display_name(&self) -> &str {
        &self.nome
    }
    fn image_ref(&self) -> Option<&str> {
        self.imagens.first().map(String::as_str)
    }
    fn is_active(&self) -> bool {
        self.ativo.unwrap_or(true)
    }
}

impl EntityMeta for PostRow {
    fn id(&self) -> i64 {
        self.id
    }
    fn display_name(&self) -> &str {
        &self.title
    }
    fn image_ref(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

impl EntityMeta for ServiceRow {
    fn id(&self) -> i64 {
        self.id
    }
    fn display_name(&self) -> &str {
        &self.titulo
    }
    fn image_ref(&self) -> Option<&str> {
        self.imagem.as_deref()
    }
    fn is_active(&self) -> bool {
        self.ativo.unwrap_or(true)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Admin form inputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionalInput {
    pub nome: String,
    #[serde(default)]
    pub especialidades: Vec<String>,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub imagens: Vec<String>,
    #[serde(default)]
    pub ativo: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInput {
    pub titulo: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub imagem: Option<String>,
    #[serde(default)]
    pub duracao: Option<i32>,
    #[serde(default)]
    pub ativo: Option<bool>,
}
