mod migration;
mod models;
mod schema;

pub use migration::run_migrations;
pub use models::{NewUser, User};
pub use schema::users;

#[cfg(test)]
pub(crate) use migration::MIGRATIONS;
