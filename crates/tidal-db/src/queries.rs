//! Database query functions organized by table.

pub mod claims;
pub mod pools;
pub mod settings;
pub mod tokens;
pub mod transfers;
