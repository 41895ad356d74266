//! Inline review comments.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pull_request_review_comments_versioned")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub version: i32,

    // ─── Identity ────────────────────────────────────────────────────────────
    pub node_id: String,
    pub database_id: i64,
    pub repository_owner: String,
    pub repository_name: String,
    pub pull_request_number: i64,
    /// `database_id` of the parent review.
    pub pull_request_review_id: i64,
    /// Arrival order within the download.
    pub sequence: i64,

    // ─── Content ─────────────────────────────────────────────────────────────
    pub author: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub path: String,
    /// Line in the current diff; unset once the comment is outdated.
    pub position: Option<i64>,
    pub original_position: Option<i64>,
    #[sea_orm(column_type = "Text")]
    pub diff_hunk: String,
    pub url: String,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
