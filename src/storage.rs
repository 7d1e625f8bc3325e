//! Persistence seam between routes, sessions, and the agent pipeline.
//!
//! `PgStorage` is the production backend; `MemStorage` backs tests and
//! credential-less local runs with the same contract.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

use crate::database::connection::DatabaseConnection;
use crate::database::models::{FromRow, SessionRecord, User};
use crate::error::AppError;

/// Fields required to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn update_user_wallet(
        &self,
        id: i64,
        chain_address: &str,
        private_key: &str,
    ) -> Result<User, AppError>;

    async fn create_session(&self, session: SessionRecord) -> Result<(), AppError>;
    /// Fetch a live session; expired rows are treated as absent.
    async fn get_session(&self, id: Uuid) -> Result<Option<SessionRecord>, AppError>;
    async fn delete_session(&self, id: Uuid) -> Result<(), AppError>;
}

/// PostgreSQL-backed storage.
#[derive(Clone)]
pub struct PgStorage {
    db: DatabaseConnection,
}

impl PgStorage {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let client = self.db.pool().get().await?;
        let row = client
            .query_opt("SELECT * FROM users WHERE id = $1", &[&id])
            .await?;
        row.map(|r| User::from_row(&r)).transpose().map_err(Into::into)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let client = self.db.pool().get().await?;
        let row = client
            .query_opt("SELECT * FROM users WHERE username = $1", &[&username])
            .await?;
        row.map(|r| User::from_row(&r)).transpose().map_err(Into::into)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let client = self.db.pool().get().await?;
        let row = client
            .query_one(
                "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING *",
                &[&user.username, &user.password_hash],
            )
            .await?;
        User::from_row(&row).map_err(Into::into)
    }

    async fn update_user_wallet(
        &self,
        id: i64,
        chain_address: &str,
        private_key: &str,
    ) -> Result<User, AppError> {
        let client = self.db.pool().get().await?;
        let row = client
            .query_opt(
                "UPDATE users SET chain_address = $2, private_key = $3 WHERE id = $1 RETURNING *",
                &[&id, &chain_address, &private_key],
            )
            .await?;
        match row {
            Some(row) => User::from_row(&row).map_err(Into::into),
            None => Err(AppError::NotFound("user".to_string())),
        }
    }

    async fn create_session(&self, session: SessionRecord) -> Result<(), AppError> {
        let client = self.db.pool().get().await?;
        client
            .execute(
                "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
                &[
                    &session.id,
                    &session.user_id,
                    &session.created_at,
                    &session.expires_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<SessionRecord>, AppError> {
        let client = self.db.pool().get().await?;
        let row = client
            .query_opt(
                "SELECT * FROM sessions WHERE id = $1 AND expires_at > NOW()",
                &[&id],
            )
            .await?;
        row.map(|r| SessionRecord::from_row(&r))
            .transpose()
            .map_err(Into::into)
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), AppError> {
        let client = self.db.pool().get().await?;
        client
            .execute("DELETE FROM sessions WHERE id = $1", &[&id])
            .await?;
        Ok(())
    }
}

/// In-memory storage with the same contract as `PgStorage`.
#[derive(Debug)]
pub struct MemStorage {
    users: DashMap<i64, User>,
    sessions: DashMap<Uuid, SessionRecord>,
    next_id: AtomicI64,
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            sessions: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.username == username)
            .map(|entry| entry.clone()))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        if self.get_user_by_username(&user.username).await?.is_some() {
            return Err(AppError::Database("username already exists".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            chain_address: None,
            private_key: None,
            created_at: Utc::now(),
        };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user_wallet(
        &self,
        id: i64,
        chain_address: &str,
        private_key: &str,
    ) -> Result<User, AppError> {
        let mut entry = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;
        entry.chain_address = Some(chain_address.to_string());
        entry.private_key = Some(private_key.to_string());
        Ok(entry.clone())
    }

    async fn create_session(&self, session: SessionRecord) -> Result<(), AppError> {
        self.sessions.insert(session.id, session);
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<SessionRecord>, AppError> {
        Ok(self
            .sessions
            .get(&id)
            .filter(|s| s.expires_at > Utc::now())
            .map(|s| s.clone()))
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), AppError> {
        self.sessions.remove(&id);
        Ok(())
    }
}
