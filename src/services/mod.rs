pub mod cache;
pub mod country;
pub mod database;
pub mod refresh;
pub mod store;
pub mod upstream;
