pub mod kv;
pub mod open;
