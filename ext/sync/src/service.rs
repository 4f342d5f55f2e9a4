//! Ports consumed by the synchronizer.
//!
//! The registration service turns a [`RegistrationPayload`] into a live
//! binding in the execution environment; the fetcher retrieves remote text
//! (remote requires, update checks). Both are async: each call is a
//! suspension point.

use async_trait::async_trait;

use crate::{FetchError, RegistrationError, RegistrationPayload};

/// Creates live registrations.
///
/// `register` may fail; the synchronizer records the message and moves on.
#[async_trait]
pub trait RegistrationService: Send + Sync {
    async fn register(
        &self,
        payload: RegistrationPayload,
    ) -> Result<Box<dyn RegistrationHandle>, RegistrationError>;
}

/// A live registration. Dropping a handle does not unregister it.
#[async_trait]
pub trait RegistrationHandle: Send + Sync {
    /// The payload id this handle was registered under.
    fn id(&self) -> &str;

    async fn unregister(&self);
}

/// Retrieves remote text.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
