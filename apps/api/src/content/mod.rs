//! Content administration for professionals, services and blog posts.
//!
//! Each content type is described once by a `ContentType` marker so the
//! repository and handlers stay generic over it. Inputs are validated before
//! any backend call is made.

use serde::{de::DeserializeOwned, Serialize};

pub mod handlers;
pub mod images;
pub mod repository;

use crate::models::content::{
    EntityKind, EntityMeta, PostInput, PostRow, ProfessionalInput, ProfessionalRow, ServiceInput,
    ServiceRow,
};

/// Checks performed on admin form input before it is sent anywhere.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

pub trait ContentType: Send + Sync + 'static {
    const KIND: EntityKind;
    type Row: DeserializeOwned + Serialize + EntityMeta + Send + Sync + 'static;
    type Input: DeserializeOwned + Serialize + Validate + Send + Sync + 'static;
}

pub struct Professionals;
pub struct Posts;
pub struct Services;

impl ContentType for Professionals {
    const KIND: EntityKind = EntityKind::Professional;
    type Row = ProfessionalRow;
    type Input = ProfessionalInput;
}

impl ContentType for Posts {
    const KIND: EntityKind = EntityKind::Post;
    type Row = PostRow;
    type Input = PostInput;
}

impl ContentType for Services {
    const KIND: EntityKind = EntityKind::Service;
    type Row = ServiceRow;
    type Input = ServiceInput;
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    Ok(())
}

impl Validate for ProfessionalInput {
    fn validate(&self) -> Result<(), String> {
        require("nome", &self.nome)
    }
}

impl Validate for ServiceInput {
    fn validate(&self) -> Result<(), String> {
        require("titulo", &self.titulo)?;
        match self.duracao {
            Some(minutes) if minutes <= 0 => Err("duracao must be positive".to_string()),
            _ => Ok(()),
        }
    }
}

impl Validate for PostInput {
    fn validate(&self) -> Result<(), String> {
        require("title", &self.title)?;
        require("content", &self.content)
    }
}
