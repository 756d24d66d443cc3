pub mod api_server;
pub mod postgres;
pub mod store;

pub use api_server::{bind_address, start_api_server};
pub use postgres::PostgresStore;
pub use store::RecordStore;

#[cfg(test)]
pub use store::MockRecordStore;
