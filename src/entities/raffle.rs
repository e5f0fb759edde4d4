//! Raffle entity - A single lottery event with a fixed pool of numbered tickets.
//!
//! The ticket pool, price and hold duration are fixed once the raffle is created;
//! only `status` changes afterwards.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a raffle
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum RaffleStatus {
    /// Tickets can be reserved and paid
    #[sea_orm(string_value = "active")]
    Active,
    /// Drawing is over; kept for history
    #[sea_orm(string_value = "finished")]
    Finished,
}

/// Raffle database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "raffles")]
pub struct Model {
    /// Unique identifier for the raffle
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name shown to customers
    pub name: String,
    /// Size of the ticket pool (100 or 1000)
    pub total_numbers: i32,
    /// Unit price of one ticket
    pub ticket_price: f64,
    /// How long a reservation may stay unpaid before the expiry sweep releases it
    pub reserve_hours: i32,
    /// Whether the raffle is still selling
    pub status: RaffleStatus,
    /// When the raffle was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Raffle and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One raffle owns many tickets
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
