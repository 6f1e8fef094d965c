pub mod column_mapper;
pub mod csv_converter;
pub mod legacy_transform;
