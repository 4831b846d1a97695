use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Deserialize;

use crate::db::entities::{language, prelude::Language};

#[derive(Debug, thiserror::Error)]
pub enum LanguageError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Language not found: {0}")]
    NotFound(i32),
    #[error("A language with the code '{0}' already exists.")]
    DuplicateCode(String),
    #[error("Invalid language: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageInput {
    pub name: String,
    pub code: String,
}

pub struct LanguageService;

impl LanguageService {
    pub async fn create(db: &DbConn, input: LanguageInput) -> Result<language::Model, LanguageError> {
        let (name, code) = Self::normalize(input)?;
        Self::ensure_code_free(db, &code, None).await?;

        let now = Utc::now();
        let new_language = language::ActiveModel {
            name: Set(name),
            code: Set(code),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(new_language.insert(db).await?)
    }

    pub async fn list(db: &DbConn) -> Result<Vec<language::Model>, LanguageError> {
        Ok(Language::find().order_by_asc(language::Column::Name).all(db).await?)
    }

    pub async fn get(db: &DbConn, language_id: i32) -> Result<language::Model, LanguageError> {
        Language::find_by_id(language_id)
            .one(db)
            .await?
            .ok_or(LanguageError::NotFound(language_id))
    }

    pub async fn update(
        db: &DbConn,
        language_id: i32,
        input: LanguageInput,
    ) -> Result<language::Model, LanguageError> {
        let existing = Self::get(db, language_id).await?;
        let (name, code) = Self::normalize(input)?;
        Self::ensure_code_free(db, &code, Some(language_id)).await?;

        let mut active: language::ActiveModel = existing.into();
        active.name = Set(name);
        active.code = Set(code);
        active.updated_at = Set(Utc::now());
        Ok(active.update(db).await?)
    }

    pub async fn delete(db: &DbConn, language_id: i32) -> Result<(), LanguageError> {
        let existing = Self::get(db, language_id).await?;
        existing.delete(db).await?;
        Ok(())
    }

    fn normalize(input: LanguageInput) -> Result<(String, String), LanguageError> {
        let name = input.name.trim().to_string();
        let code = input.code.trim().to_lowercase();
        if name.is_empty() || code.is_empty() {
            return Err(LanguageError::InvalidInput("name and code are required".to_string()));
        }
        if code.contains(',') {
            return Err(LanguageError::InvalidInput("code cannot contain commas".to_string()));
        }
        Ok((name, code))
    }

    async fn ensure_code_free(
        db: &DbConn,
        code: &str,
        except_id: Option<i32>,
    ) -> Result<(), LanguageError> {
        let clash = Language::find()
            .filter(language::Column::Code.eq(code))
            .one(db)
            .await?;
        match clash {
            Some(other) if Some(other.id) != except_id => {
                Err(LanguageError::DuplicateCode(code.to_string()))
            }
            _ => Ok(()),
        }
    }
}
