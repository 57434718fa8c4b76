//! Todo Module
//! Mission: Owner-scoped CRUD over todo items with status exclusivity

pub mod api;
pub mod models;
pub mod store;

pub use api::TodoApiState;
pub use store::TodoStore;
