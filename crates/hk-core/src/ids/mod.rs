//! ID type wrappers for type safety.

pub mod account_id;

pub use account_id::AccountId;
