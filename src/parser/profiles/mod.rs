//! Pattern tables for each profiled language

pub mod go;
pub mod javascript;
pub mod jvm;
pub mod python;
pub mod rust;
