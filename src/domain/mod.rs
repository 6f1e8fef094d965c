pub mod error;
pub mod table;
pub mod transform;
