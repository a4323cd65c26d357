mod actor;
mod conn;
mod server;

pub use actor::run_query;
pub use server::{Server, ServerError};
