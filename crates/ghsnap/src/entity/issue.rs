//! Issue snapshot rows, keyed by repository and number within a generation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "issues_versioned")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub version: i32,

    pub node_id: String,
    pub database_id: i64,
    pub repository_owner: String,
    pub repository_name: String,
    pub number: i64,

    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub state: String,
    /// Author login; `ghost` for deleted accounts.
    pub author: String,
    pub url: String,
    pub locked: bool,
    #[sea_orm(column_type = "Json")]
    pub assignees: Json,
    #[sea_orm(column_type = "Json")]
    pub labels: Json,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub closed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
