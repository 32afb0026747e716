pub mod session;
pub mod throttle;

pub use session::{load_session, CurrentUser, RequireUser, Session};
pub use throttle::throttle_registrations;
