use diesel::{prelude::*, sqlite::SqliteConnection};
use serde::Serialize;

use super::users;
use crate::{DbConn, Error, auth::Credential};

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub hashed_password: String,
}

impl User {
    pub fn credential(&self) -> Credential {
        Credential::from_stored(self.hashed_password.clone())
    }

    pub fn by_username(conn: &mut SqliteConnection, username: &str) -> QueryResult<Option<User>> {
        users::table
            .filter(users::username.eq(username))
            .select(User::as_select())
            .first(conn)
            .optional()
    }

    pub fn by_email(conn: &mut SqliteConnection, email: &str) -> QueryResult<Option<User>> {
        users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(conn)
            .optional()
    }

    pub fn insert(conn: &mut SqliteConnection, user: NewUser) -> QueryResult<User> {
        diesel::insert_into(users::table)
            .values(user)
            .returning(User::as_returning())
            .get_result(conn)
    }

    pub async fn find_by_username(conn: &DbConn, username: &str) -> Result<Option<User>, Error> {
        let username = username.to_owned();
        conn.interact(move |conn| Self::by_username(conn, &username))
            .await?
            .map_err(|e| e.into())
    }

    pub async fn find_by_email(conn: &DbConn, email: &str) -> Result<Option<User>, Error> {
        let email = email.to_owned();
        conn.interact(move |conn| Self::by_email(conn, &email))
            .await?
            .map_err(|e| e.into())
    }

    pub async fn create(conn: &DbConn, user: NewUser) -> Result<User, Error> {
        conn.interact(move |conn| Self::insert(conn, user))
            .await?
            .map_err(|e| e.into())
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
}

impl NewUser {
    pub fn new(username: String, email: String, credential: Credential) -> Self {
        Self {
            username,
            email,
            hashed_password: credential.into_string(),
        }
    }
}
