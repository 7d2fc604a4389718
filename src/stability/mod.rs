pub mod filter;
pub mod parameters;
pub mod window;
