use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, Result};

/// A résumé record as stored in the profile store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvDocument {
    /// The user who created this CV.
    pub owner_id: i64,
    /// The human-chosen profession; doubles as the user-facing cache key.
    pub profession: String,
    pub name: String,
    pub surname: String,
    pub age: u32,
    pub living_city: String,
    pub salary: u64,
    pub email: String,
    pub phone: String,
    pub education: String,
    /// Ordered as entered.
    #[serde(default)]
    pub soft_skills: Vec<String>,
    /// Ordered as entered.
    #[serde(default)]
    pub hard_skills: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl CvDocument {
    /// The store key this document lives under.
    pub fn key(&self) -> ProfileKey {
        ProfileKey::new(self.owner_id, self.profession.clone())
    }

    /// Serializes the document into the blob format kept in the store.
    pub fn to_blob(&self) -> Result<String> {
        sonic_rs::to_string(self)
            .map_err(|e| AppError::Serialization(format!("CV serialization failed: {}", e)))
    }

    /// Parses a blob previously produced by [`CvDocument::to_blob`].
    pub fn from_blob(blob: &str) -> Result<Self> {
        sonic_rs::from_str(blob)
            .map_err(|e| AppError::Serialization(format!("CV deserialization failed: {}", e)))
    }
}

/// The fields a user submits when making a CV. Ownership comes from the session.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCv {
    pub profession: String,
    pub name: String,
    pub surname: String,
    pub age: u32,
    pub living_city: String,
    pub salary: u64,
    pub email: String,
    pub phone: String,
    pub education: String,
    #[serde(default)]
    pub soft_skills: Vec<String>,
    #[serde(default)]
    pub hard_skills: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl NewCv {
    /// Binds the submitted fields to their owner.
    pub fn into_document(self, owner_id: i64) -> CvDocument {
        CvDocument {
            owner_id,
            profession: self.profession.trim().to_string(),
            name: self.name,
            surname: self.surname,
            age: self.age,
            living_city: self.living_city,
            salary: self.salary,
            email: self.email,
            phone: self.phone,
            education: self.education,
            soft_skills: self.soft_skills,
            hard_skills: self.hard_skills,
            description: self.description,
        }
    }
}

/// Key of a CV in the profile store.
///
/// Profession strings are not unique across owners, so the stored key is
/// scoped by the owner id: `cv:{owner_id}:{profession}`. The prefix is only a
/// namespace; ownership is always re-checked on the deserialized document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileKey {
    pub owner_id: i64,
    pub profession: String,
}

const KEY_PREFIX: &str = "cv:";

impl ProfileKey {
    pub fn new(owner_id: i64, profession: impl Into<String>) -> Self {
        Self {
            owner_id,
            profession: profession.into(),
        }
    }

    /// The string form kept in the cache store and in the index.
    pub fn storage_key(&self) -> String {
        format!("{}{}:{}", KEY_PREFIX, self.owner_id, self.profession)
    }

    /// Parses an index entry. Returns `None` for anything not written by
    /// [`ProfileKey::storage_key`].
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix(KEY_PREFIX)?;
        let (owner, profession) = rest.split_once(':')?;
        let owner_id = owner.parse().ok()?;
        if profession.is_empty() {
            return None;
        }
        Some(Self::new(owner_id, profession))
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

#[cfg(test)]
pub(crate) fn sample_cv(owner_id: i64, profession: &str) -> CvDocument {
    CvDocument {
        owner_id,
        profession: profession.to_string(),
        name: "Anna".to_string(),
        surname: "Petrova".to_string(),
        age: 31,
        living_city: "Kazan".to_string(),
        salary: 120_000,
        email: "anna@example.com".to_string(),
        phone: "+7 900 000 00 00".to_string(),
        education: "KFU".to_string(),
        soft_skills: vec!["teamwork".to_string(), "patience".to_string()],
        hard_skills: vec!["knife work".to_string()],
        description: "Line cook".to_string(),
    }
}
