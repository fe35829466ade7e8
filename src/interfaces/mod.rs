pub mod api;
pub mod csv;
