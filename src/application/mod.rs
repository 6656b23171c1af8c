// Application layer: the ledger service that clients (CLI, shell, export) drive.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
