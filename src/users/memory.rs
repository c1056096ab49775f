use super::{NewUser, User, UserCounts, UserStore, UserStoreError};
use crate::resource::{Jrd, MemoryResourceStore};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    users: Vec<User>,
}

/// In-process user store. When linked to a [`MemoryResourceStore`], created users are
/// published there so they resolve over WebFinger like rows of the `users` table do.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
    resources: Option<Arc<MemoryResourceStore>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resources(mut self, resources: Arc<MemoryResourceStore>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Returns whether the user exists.
    pub async fn set_active(&self, id: i64, is_active: bool) -> bool {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.iter_mut().find(|user| user.id == id) else {
            return false;
        };
        user.is_active = is_active;
        let subject = user.subject.clone();
        drop(inner);

        if let Some(resources) = &self.resources {
            if is_active {
                resources.upsert(Jrd::new(subject)).await;
            } else {
                resources.remove(&subject).await;
            }
        }
        true
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: &NewUser) -> Result<User, UserStoreError> {
        let mut inner = self.inner.write().await;
        let taken = inner.users.iter().any(|existing| {
            existing.username == user.username
                || existing.email.eq_ignore_ascii_case(&user.email)
                || existing.subject.eq_ignore_ascii_case(&user.subject)
        });
        if taken {
            return Err(UserStoreError::Conflict);
        }

        inner.next_id += 1;
        let created = User {
            id: inner.next_id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: Some(user.password_hash.clone()),
            domain: user.domain.clone(),
            subject: user.subject.clone(),
            is_admin: user.is_admin,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        inner.users.push(created.clone());
        drop(inner);

        if let Some(resources) = &self.resources {
            resources.upsert(Jrd::new(created.subject.clone())).await;
        }
        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserStoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn touch_last_login(&self, id: i64) -> Result<(), UserStoreError> {
        if let Some(user) = self
            .inner
            .write()
            .await
            .users
            .iter_mut()
            .find(|user| user.id == id)
        {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }

    async fn counts(&self) -> Result<UserCounts, UserStoreError> {
        let inner = self.inner.read().await;
        let count = |pred: fn(&User) -> bool| {
            i64::try_from(inner.users.iter().filter(|user| pred(user)).count()).unwrap_or(i64::MAX)
        };
        Ok(UserCounts {
            total: count(|_| true),
            active: count(|user| user.is_active),
            admins: count(|user| user.is_admin),
        })
    }
}
