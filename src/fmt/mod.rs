//! Presentation of query results (text and JSON).

pub mod json;
pub mod text;
