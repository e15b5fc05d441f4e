pub mod database;
pub mod history;

pub use database::{Database, WriteMode};
pub use history::RunHistory;
