//! Database models split into one module per table.
//!
//! Each model owns the queries that read or write its table. Queries take any
//! SQLite executor so the same call works against the pool or inside a
//! transaction.

pub mod candidate;
pub mod invited_voter;
pub mod position;
pub mod session;
pub mod vote;

pub use candidate::*;
pub use invited_voter::*;
pub use position::*;
pub use session::*;
pub use vote::*;
