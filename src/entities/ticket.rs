//! Ticket entity - One purchasable number within a raffle.
//!
//! The number is generated when the raffle is created and never changes. `status` is a
//! stored cache of what the ticket's payments say; every mutating engine operation
//! re-establishes it inside the same transaction that changed the payments.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Where a ticket is in its sale lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// No owner and no payments
    #[sea_orm(string_value = "available")]
    Available,
    /// Owned, payments below the raffle price
    #[sea_orm(string_value = "reserved")]
    Reserved,
    /// Payments meet or exceed the raffle price
    #[sea_orm(string_value = "paid")]
    Paid,
}

/// Ticket database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    /// Unique identifier for the ticket
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Raffle this ticket belongs to
    pub raffle_id: i64,
    /// Zero-padded display number, unique within the raffle
    pub number: String,
    /// Customer holding the ticket, None while available
    pub user_id: Option<i64>,
    /// Current lifecycle status
    pub status: TicketStatus,
    /// When the ticket left the available pool
    pub reserved_at: Option<DateTimeUtc>,
}

/// Defines relationships between Ticket and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each ticket belongs to one raffle
    #[sea_orm(
        belongs_to = "super::raffle::Entity",
        from = "Column::RaffleId",
        to = "super::raffle::Column::Id"
    )]
    Raffle,
    /// A ticket may be held by one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// One ticket has many payments
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::raffle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Raffle.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
