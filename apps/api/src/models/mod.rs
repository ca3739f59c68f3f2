pub mod document;
pub mod message;
