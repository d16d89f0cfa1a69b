use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use rearch::CapsuleHandle;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::{
    key,
    link_repo::{CreateUrlError, Link, LinkRepository, link_repository_capsule},
};

/// Browsers ask for this on their own; it is never a short link.
pub const RESERVED_KEY: &str = "favicon.ico";

const CREATE_ATTEMPTS: usize = 3;

pub fn link_service_capsule(CapsuleHandle { mut get, .. }: CapsuleHandle) -> Arc<dyn LinkService> {
    let link_repo = Arc::clone(get.as_ref(link_repository_capsule));
    new_link_service(link_repo)
}

#[must_use]
pub fn new_link_service(link_repo: Arc<dyn LinkRepository>) -> Arc<dyn LinkService> {
    Arc::new(LinkServiceImpl {
        link_repo,
        generate_key: key::generate_key,
    })
}

#[async_trait]
pub trait LinkService: Send + Sync {
    /// Looks up the URL a key redirects to.
    async fn resolve(&self, key: &str) -> Result<String, ResolveError>;

    /// Stores `url` under a freshly generated key.
    async fn create_link(&self, url: Option<String>) -> Result<Link, CreateLinkError>;

    /// Stores `url` under a caller-chosen key, refusing keys already in use.
    async fn create_custom_link(
        &self,
        key: String,
        url: Option<String>,
    ) -> Result<Link, CreateLinkError>;
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("URL not found")]
    NotFound,
    #[error("internal/database error: {0}")]
    Internal(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum CreateLinkError {
    #[error("URL is required")]
    MissingUrl,
    #[error("{0} is a reserved short URL")]
    ReservedKey(String),
    #[error("This short URL is already taken")]
    KeyTaken,
    #[error("internal/database error: {0}")]
    Internal(anyhow::Error), // NOTE: no #[from] so we have to be explicit
}

struct LinkServiceImpl {
    link_repo: Arc<dyn LinkRepository>,
    generate_key: fn() -> String,
}

fn require_url(url: Option<String>) -> Result<String, CreateLinkError> {
    url.filter(|url| !url.is_empty())
        .ok_or(CreateLinkError::MissingUrl)
}

#[async_trait]
impl LinkService for LinkServiceImpl {
    #[instrument(skip(self))]
    async fn resolve(&self, key: &str) -> Result<String, ResolveError> {
        if key == RESERVED_KEY {
            return Err(ResolveError::NotFound);
        }

        match self.link_repo.get_url(key).await {
            Ok(Some(url)) => Ok(url),
            Ok(None) => Err(ResolveError::NotFound),
            Err(err) => Err(ResolveError::Internal(err)),
        }
    }

    #[instrument(skip(self))]
    async fn create_link(&self, url: Option<String>) -> Result<Link, CreateLinkError> {
        let url = require_url(url)?;

        for _ in 0..CREATE_ATTEMPTS {
            let attempt_key = (self.generate_key)();

            match self.link_repo.key_exists(&attempt_key).await {
                Ok(false) => {}
                Ok(true) => {
                    warn!(?attempt_key, "Generated key that was already taken");
                    continue;
                }
                Err(err) => return Err(CreateLinkError::Internal(err)),
            }

            let to_create = Link {
                key: attempt_key,
                url: url.clone(),
            };
            match self.link_repo.create_url(to_create).await {
                Ok(link) => return Ok(link),
                // NOTE: lost a race for the key between the check and the insert
                Err(CreateUrlError::KeyTaken(attempt_key)) => {
                    warn!(?attempt_key, "Generated key was taken before insert");
                }
                Err(CreateUrlError::Internal(err)) => return Err(CreateLinkError::Internal(err)),
            }
        }

        Err(CreateLinkError::Internal(anyhow!(
            "Exhausted key generation attempts"
        )))
    }

    #[instrument(skip(self))]
    async fn create_custom_link(
        &self,
        key: String,
        url: Option<String>,
    ) -> Result<Link, CreateLinkError> {
        let url = require_url(url)?;
        if key == RESERVED_KEY {
            return Err(CreateLinkError::ReservedKey(key));
        }

        match self.link_repo.create_url(Link { key, url }).await {
            Ok(link) => Ok(link),
            Err(CreateUrlError::KeyTaken(_)) => Err(CreateLinkError::KeyTaken),
            Err(CreateUrlError::Internal(err)) => Err(CreateLinkError::Internal(err)),
        }
    }
}
