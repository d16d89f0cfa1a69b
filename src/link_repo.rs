use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use rearch::CapsuleHandle;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectionTrait, DbConn, EntityTrait, SqlErr,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::{config::db_conn_capsule, orm::link};

/// The `"key"` primary key is what makes key reservation atomic:
/// two inserts of the same key can never both succeed.
const CREATE_LINKS_TABLE: &str =
    r#"CREATE TABLE IF NOT EXISTS links ("key" TEXT PRIMARY KEY NOT NULL, url TEXT NOT NULL)"#;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Link {
    pub key: String,
    pub url: String,
}

impl From<link::Model> for Link {
    fn from(link::Model { key, url }: link::Model) -> Self {
        Self { key, url }
    }
}

#[derive(Debug, Error)]
pub enum CreateUrlError {
    #[error("key {0} is already taken")]
    KeyTaken(String),
    #[error("internal/database error: {0}")]
    Internal(anyhow::Error),
}

/// # Errors
/// Will return [`Err`] if the `links` table could not be created.
#[instrument(skip(db))]
pub async fn ensure_schema(db: &DbConn) -> anyhow::Result<()> {
    db.execute_unprepared(CREATE_LINKS_TABLE)
        .await
        .context("Failed to create links table")?;
    info!("Links table is ready");
    Ok(())
}

pub fn link_repository_capsule(
    CapsuleHandle { mut get, .. }: CapsuleHandle,
) -> Arc<dyn LinkRepository> {
    let db = get.as_ref(db_conn_capsule).clone();
    Arc::new(LinkRepositoryImpl { db })
}

#[async_trait]
pub trait LinkRepository: Send + Sync {
    async fn get_url(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn key_exists(&self, key: &str) -> anyhow::Result<bool>;

    /// Inserts a new [`Link`]. Never overwrites an existing one;
    /// a clash on the key is reported as [`CreateUrlError::KeyTaken`].
    async fn create_url(&self, link: Link) -> Result<Link, CreateUrlError>;
}

struct LinkRepositoryImpl {
    db: DbConn,
}

#[async_trait]
impl LinkRepository for LinkRepositoryImpl {
    #[instrument(skip(self))]
    async fn get_url(&self, key: &str) -> anyhow::Result<Option<String>> {
        let found = link::Entity::find_by_id(key)
            .one(&self.db)
            .await
            .context("Failed to look up link")?;
        Ok(found.map(|link| link.url))
    }

    #[instrument(skip(self))]
    async fn key_exists(&self, key: &str) -> anyhow::Result<bool> {
        let found = link::Entity::find_by_id(key)
            .one(&self.db)
            .await
            .context("Failed to check whether key exists")?;
        Ok(found.is_some())
    }

    #[instrument(skip(self))]
    async fn create_url(&self, Link { key, url }: Link) -> Result<Link, CreateUrlError> {
        let to_insert = link::ActiveModel {
            key: Set(key.clone()),
            url: Set(url),
        };
        match to_insert.insert(&self.db).await {
            Ok(inserted) => Ok(inserted.into()),
            Err(db_err) if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(CreateUrlError::KeyTaken(key))
            }
            Err(db_err) => Err(CreateUrlError::Internal(
                anyhow::Error::new(db_err).context("Failed to insert link"),
            )),
        }
    }
}
