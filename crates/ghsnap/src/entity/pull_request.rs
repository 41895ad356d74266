//! Pull request snapshot rows.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pull_requests_versioned")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub version: i32,

    // ─── Identity ────────────────────────────────────────────────────────────
    pub node_id: String,
    pub database_id: i64,
    pub repository_owner: String,
    pub repository_name: String,
    pub number: i64,

    // ─── Content ─────────────────────────────────────────────────────────────
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    /// `OPEN`, `CLOSED` or `MERGED`.
    pub state: String,
    pub author: String,
    pub url: String,
    pub base_ref_name: String,
    pub head_ref_name: String,
    #[sea_orm(column_type = "Json")]
    pub assignees: Json,
    #[sea_orm(column_type = "Json")]
    pub labels: Json,

    // ─── Status ──────────────────────────────────────────────────────────────
    pub is_draft: bool,
    pub locked: bool,
    pub merged: bool,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub closed_at: Option<DateTimeWithTimeZone>,
    pub merged_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
