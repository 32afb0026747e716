pub mod ai;
pub mod auth;
pub mod capacity;
pub mod search;
pub mod throttle;
