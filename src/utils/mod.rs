pub mod jwt;
pub mod safety;
