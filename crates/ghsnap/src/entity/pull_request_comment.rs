//! Top-level pull request comments.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pull_request_comments_versioned")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub version: i32,

    pub node_id: String,
    pub database_id: i64,
    pub repository_owner: String,
    pub repository_name: String,
    pub pull_request_number: i64,
    /// Arrival order within the download.
    pub sequence: i64,

    pub author: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub url: String,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
