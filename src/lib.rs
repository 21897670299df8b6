#[macro_use]
extern crate lazy_static;

pub mod archive;
pub mod database;
pub mod errors;
pub mod guid;
pub mod headers;
pub mod reader;
pub mod sections;
