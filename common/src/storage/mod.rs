pub mod db;
pub mod indexes;
pub mod store;
pub mod types;
