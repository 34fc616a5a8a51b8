pub mod generator;
pub mod groq;
pub mod structs;
