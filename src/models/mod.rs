pub mod country;
pub mod query;
pub mod response;
