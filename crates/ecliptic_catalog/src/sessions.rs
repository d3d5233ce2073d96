//! Organizations, users and sessions.
//!
//! The session/authentication provider itself is external; the catalog only
//! stores the rows it resolves against.

use ecliptic_fault::{ErrorEntry, Result};

use crate::models::{Organization, Session, User};
use crate::{new_id, now_rfc3339, Catalog};

impl Catalog {
    pub async fn create_organization(&self, name: &str) -> Result<Organization> {
        let org = Organization {
            id: new_id(),
            name: name.to_string(),
            created_at: now_rfc3339(),
        };
        sqlx::query("INSERT INTO organization (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&org.id)
            .bind(&org.name)
            .bind(&org.created_at)
            .execute(&self.pool)
            .await?;
        Ok(org)
    }

    pub async fn organizations(&self) -> Result<Vec<Organization>> {
        Ok(
            sqlx::query_as::<_, Organization>("SELECT * FROM organization ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn create_user(&self, email: &str) -> Result<User> {
        let user = User {
            id: new_id(),
            email: email.to_string(),
            created_at: now_rfc3339(),
        };
        sqlx::query("INSERT INTO user (id, email, created_at) VALUES (?, ?, ?)")
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.created_at)
            .execute(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM user WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Create a session pinning `user_id` to `organization_id`.
    pub async fn create_session(&self, user_id: &str, organization_id: &str) -> Result<Session> {
        let session = Session {
            id: new_id(),
            user_id: user_id.to_string(),
            active_organization_id: organization_id.to_string(),
            created_at: now_rfc3339(),
        };
        sqlx::query(
            "INSERT INTO session (id, user_id, active_organization_id, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.active_organization_id)
        .bind(&session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn session(&self, session_id: &str) -> Result<Session> {
        sqlx::query_as::<_, Session>("SELECT * FROM session WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                ErrorEntry::not_found("session.not_found", format!("session {session_id} not found"))
                    .with_external("en", "Session not found")
                    .with_external("de", "Sitzung nicht gefunden")
            })
    }
}
