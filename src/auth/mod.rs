mod credential;
mod manager;
mod token;

pub use credential::{Credential, CredentialError};
pub use manager::{AuthManager, NewUserRequest};
pub use token::{TokenError, Verification};

#[cfg(test)]
pub(crate) use credential::test_manager;
#[cfg(test)]
pub(crate) use manager::tests as manager_tests;
#[cfg(test)]
pub(crate) use token::test_service;
