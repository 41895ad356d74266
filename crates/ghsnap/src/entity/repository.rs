//! Repository snapshot rows.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repositories_versioned")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Generation this row belongs to.
    pub version: i32,

    // ─── Identity ────────────────────────────────────────────────────────────
    /// GraphQL node id.
    pub node_id: String,
    pub database_id: i64,
    pub owner: String,
    pub name: String,
    pub name_with_owner: String,

    // ─── Content ─────────────────────────────────────────────────────────────
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub url: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub homepage_url: Option<String>,
    pub primary_language: Option<String>,
    pub default_branch: Option<String>,
    /// Topic names, stored as a JSON array.
    #[sea_orm(column_type = "Json")]
    pub topics: Json,

    // ─── Flags ───────────────────────────────────────────────────────────────
    pub is_archived: bool,
    pub is_fork: bool,
    pub is_private: bool,
    pub is_template: bool,
    pub has_issues_enabled: bool,
    pub has_wiki_enabled: bool,

    // ─── Statistics ──────────────────────────────────────────────────────────
    pub stargazer_count: i64,
    pub fork_count: i64,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub pushed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}
