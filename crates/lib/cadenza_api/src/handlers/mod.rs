//! Request handlers.

pub mod composition_items;
pub mod compositions;
pub mod health;
pub mod intervals;
pub mod users;
