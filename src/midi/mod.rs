pub mod message;
pub mod output;
