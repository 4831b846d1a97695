use bcrypt::{DEFAULT_COST, hash};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;

use crate::db::entities::{prelude::User, user};

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("User not found: {0}")]
    NotFound(i32),
    #[error("A user with the email '{0}' already exists.")]
    DuplicateEmail(String),
    #[error("Invalid user: {0}")]
    InvalidInput(String),
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_admin: Option<bool>,
}

fn normalize_email(email: &str) -> Result<String, UserError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(UserError::InvalidInput("a valid email is required".to_string()));
    }
    Ok(email)
}

fn hash_password(password: &str) -> Result<String, UserError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(UserError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(hash(password, DEFAULT_COST)?)
}

pub struct UserService;

impl UserService {
    pub async fn count(db: &DbConn) -> Result<u64, UserError> {
        Ok(User::find().count(db).await?)
    }

    pub async fn list(db: &DbConn) -> Result<Vec<user::Model>, UserError> {
        Ok(User::find().order_by_asc(user::Column::Id).all(db).await?)
    }

    pub async fn get(db: &DbConn, user_id: i32) -> Result<user::Model, UserError> {
        User::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or(UserError::NotFound(user_id))
    }

    pub async fn find_by_id(db: &DbConn, user_id: i32) -> Result<Option<user::Model>, UserError> {
        Ok(User::find_by_id(user_id).one(db).await?)
    }

    pub async fn find_by_email(db: &DbConn, email: &str) -> Result<Option<user::Model>, UserError> {
        Ok(User::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(db)
            .await?)
    }

    pub async fn create(db: &DbConn, new_user: NewUser) -> Result<user::Model, UserError> {
        let email = normalize_email(&new_user.email)?;
        if Self::find_by_email(db, &email).await?.is_some() {
            return Err(UserError::DuplicateEmail(email));
        }
        let password_hash = hash_password(&new_user.password)?;

        let now = Utc::now();
        let model = user::ActiveModel {
            email: Set(email),
            password_hash: Set(password_hash),
            is_admin: Set(new_user.is_admin),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(model.insert(db).await?)
    }

    pub async fn update(db: &DbConn, user_id: i32, changes: UserUpdate) -> Result<user::Model, UserError> {
        let existing = Self::get(db, user_id).await?;
        let mut active: user::ActiveModel = existing.clone().into();

        if let Some(email) = changes.email {
            let email = normalize_email(&email)?;
            if email != existing.email {
                if Self::find_by_email(db, &email).await?.is_some() {
                    return Err(UserError::DuplicateEmail(email));
                }
                active.email = Set(email);
            }
        }
        if let Some(password) = changes.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(is_admin) = changes.is_admin {
            active.is_admin = Set(is_admin);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(db).await?)
    }

    pub async fn delete(db: &DbConn, user_id: i32) -> Result<(), UserError> {
        let existing = Self::get(db, user_id).await?;
        existing.delete(db).await?;
        Ok(())
    }
}
