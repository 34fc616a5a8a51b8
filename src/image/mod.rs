pub mod generator;
pub mod magic_hour;
pub mod structs;
