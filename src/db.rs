pub mod disease_sh;
pub mod prod_db;
pub mod store;
