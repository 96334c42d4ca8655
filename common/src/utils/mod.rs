pub mod config;
pub mod csv_export;
pub mod reference;
pub mod token;
