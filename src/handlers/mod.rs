pub mod caller;
pub mod health;
pub mod two_factor;

pub use caller::{ACCOUNT_ID_HEADER, AuthenticatedAccount};
pub use health::health_check;
pub use two_factor::{
    disable_2fa, regenerate_backup_codes, setup_2fa, status_2fa, step_up, verify_2fa,
};
