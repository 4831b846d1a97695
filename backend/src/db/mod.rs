//! Persistence layer.
//!
//! `entities` maps tables, `types` holds the typed JSON columns, and `services`
//! wraps every query the rest of the application needs.

pub mod entities;
pub mod services;
pub mod types;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use tracing::info;

use crate::db::entities::{article, category, language, log, task, user, website};

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(10).sqlx_logging(false);
    Database::connect(opt).await
}

/// Creates every table that does not exist yet. Referenced tables come first.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());
    create_table(db, &schema, user::Entity).await?;
    create_table(db, &schema, website::Entity).await?;
    create_table(db, &schema, language::Entity).await?;
    create_table(db, &schema, category::Entity).await?;
    create_table(db, &schema, task::Entity).await?;
    create_table(db, &schema, article::Entity).await?;
    create_table(db, &schema, log::Entity).await?;
    info!("Database schema is ready.");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(db.get_database_backend().build(&stmt)).await?;
    Ok(())
}

/// Fresh in-memory SQLite database with the full schema, for tests.
#[cfg(test)]
pub async fn test_connection() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.expect("in-memory sqlite should open");
    create_schema(&db).await.expect("schema should be created");
    db
}
