pub mod accounts;

pub use accounts::{AccountError, AccountLookup, AccountService, CurrentUser};
