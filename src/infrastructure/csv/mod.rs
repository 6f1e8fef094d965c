// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// CSV tokenizing and upload decoding

mod csv_parser;

pub use csv_parser::{decode_text, CsvParser};
