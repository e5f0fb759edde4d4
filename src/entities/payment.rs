//! Payment entity - Append-only money received against a ticket.
//!
//! The amount collected for a ticket is always `SUM(amount)` over its payments;
//! no running total is stored anywhere.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Ticket this payment counts towards
    pub ticket_id: i64,
    /// Amount received, always positive
    pub amount: f64,
    /// How the money arrived (`"cash"`, `"transfer"`, ...)
    pub method: String,
    /// Free-text reference such as a transfer confirmation
    pub reference: String,
    /// True when an administrator recorded or checked the payment
    pub is_verified: bool,
    /// When the payment was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one ticket
    #[sea_orm(
        belongs_to = "super::ticket::Entity",
        from = "Column::TicketId",
        to = "super::ticket::Column::Id"
    )]
    Ticket,
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ticket.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
