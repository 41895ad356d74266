//! The published generation pointer.
//!
//! The table holds at most one row, with [`POINTER_ID`] as its key. Readers
//! resolve it before reading any `*_versioned` table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Primary key of the single pointer row.
pub const POINTER_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "active_version")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub version: i32,
    /// When the pointer last moved.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
