//! SeaORM Entity for archived price samples

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bitcoin_archive")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Original poll time copied from the live row
    pub timestamp: Option<DateTime>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub price: Option<Decimal>,
    /// Set by the database when the row is archived
    pub transferred_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
