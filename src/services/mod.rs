pub mod caller_token;
pub mod qr;
pub mod secret_cipher;
pub mod two_factor;

pub use caller_token::CallerToken;
pub use secret_cipher::SecretCipher;
pub use two_factor::TwoFactorService;
