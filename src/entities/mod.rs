//! Entity module - Contains all SeaORM entity definitions for the ledger store.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod payment;
pub mod raffle;
pub mod ticket;
pub mod user;

// Re-export specific types to avoid conflicts
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel};
pub use raffle::{Column as RaffleColumn, Entity as Raffle, Model as RaffleModel, RaffleStatus};
pub use ticket::{Column as TicketColumn, Entity as Ticket, Model as TicketModel, TicketStatus};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
