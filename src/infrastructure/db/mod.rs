pub mod transform_store;
