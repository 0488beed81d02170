pub mod cache;
pub mod calc;
pub mod catalog;
pub mod model;
pub mod session;
