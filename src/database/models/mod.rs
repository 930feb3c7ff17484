pub mod place;
pub mod user;

pub use place::{Location, NewPlace, Place};
pub use user::User;
