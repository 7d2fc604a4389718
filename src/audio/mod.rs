pub mod capture;
pub mod session;
pub mod wav;
