use std::{error::Error, fs::create_dir_all, path::Path};

use diesel::{Connection, sqlite::SqliteConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn run_migrations(database_url: &str) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let path = Path::new(database_url);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            create_dir_all(parent)?;
        }
    }
    let mut connection = SqliteConnection::establish(database_url)?;
    let applied = connection.run_pending_migrations(MIGRATIONS)?;
    for version in applied {
        info!("applied migration {}", version);
    }

    Ok(())
}
