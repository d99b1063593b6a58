//! Master credential: first-run setup and login verification

mod store;
mod types;

pub use store::{MasterCredentialStore, HASH_KEY, ITERATIONS_KEY, SALT_KEY};
pub use types::{MasterCredential, MIN_PASSWORD_LEN};
