//! SeaORM Entity for the live price table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bitcoin_prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Poll time (naive UTC), defaults to insert time
    pub timestamp: Option<DateTime>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
