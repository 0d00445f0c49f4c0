pub mod action;
pub mod two_factor;

pub use action::ActionKind;
pub use two_factor::{TwoFactorRecord, TwoFactorState};
