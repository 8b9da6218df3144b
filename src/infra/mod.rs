// Infrastructure adapters implementing application ports

pub mod sqlite_warehouse;

pub use sqlite_warehouse::SqliteWarehouse;
