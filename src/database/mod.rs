use log::info;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

use self::migration::Migrator;
use std::io;
use std::path::Path;
use tokio::fs::{create_dir_all, File};

pub mod entities;
pub mod migration;

pub type DbResult<T> = Result<T, sea_orm::DbErr>;

/// Connects to the database file creating it if it's missing and
/// brings the schema up to date
pub async fn connect(db_file: &str) -> io::Result<DatabaseConnection> {
    info!("Connecting to database..");

    let file_path = Path::new(db_file);
    if let Some(parent) = file_path.parent() {
        if !parent.exists() {
            create_dir_all(parent).await?;
        }
    }

    if !file_path.exists() {
        File::create(file_path).await?;
    }

    let con_str = format!("sqlite:{db_file}");
    let connection = sea_orm::Database::connect(&con_str).await.map_err(|err| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Unable to create database connection: {err:?}"),
        )
    })?;

    info!("Connected to database: {con_str}");

    info!("Running migrations...");

    Migrator::up(&connection, None).await.map_err(|err| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Unable to run database migrations: {err:?}"),
        )
    })?;

    info!("Migrations complete.");

    Ok(connection)
}

/// Connects to an isolated in-memory database with the schema applied.
/// Used by tests only. The pool is capped at one connection because
/// every pooled sqlite connection would otherwise see its own empty
/// in-memory database.
#[cfg(test)]
pub async fn connect_test() -> DatabaseConnection {
    let mut options = sea_orm::ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1);
    let connection = sea_orm::Database::connect(options)
        .await
        .expect("Unable to create test database connection");
    Migrator::up(&connection, None)
        .await
        .expect("Unable to run test database migrations");
    connection
}
