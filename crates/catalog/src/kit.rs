use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promisekit_core::{DomainError, DomainResult, Entity, FieldErrors, KitId, ValueObject};

pub const BLANK: &str = "can't be blank";
pub const SLUG_FORMAT: &str = "must contain only lowercase letters, numbers, and hyphens";

/// URL-safe kit handle: non-empty, `[a-z0-9-]` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KitSlug(String);

impl KitSlug {
    /// Parse a slug as-is. No case folding is applied: `"Test-Kit"` is rejected,
    /// not lowercased.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if raw.is_empty() {
            return Err(DomainError::validation(format!("slug {BLANK}")));
        }
        if !Self::is_valid(raw) {
            return Err(DomainError::validation(format!("slug {SLUG_FORMAT}")));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn is_valid(raw: &str) -> bool {
        !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for KitSlug {}

impl TryFrom<String> for KitSlug {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<KitSlug> for String {
    fn from(value: KitSlug) -> Self {
        value.0
    }
}

impl core::fmt::Display for KitSlug {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attributes for a kit that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKit {
    pub name: String,
    pub description: String,
    pub slug: String,
}

impl NewKit {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            slug: slug.into(),
        }
    }

    /// Collect every data-rule violation. Name uniqueness is a storage concern.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", BLANK);
        }
        if self.description.trim().is_empty() {
            errors.add("description", BLANK);
        }
        if self.slug.is_empty() {
            errors.add("slug", BLANK);
        } else if !KitSlug::is_valid(&self.slug) {
            errors.add("slug", SLUG_FORMAT);
        }
        errors
    }
}

/// A purchasable fitness kit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kit {
    id: KitId,
    name: String,
    description: String,
    slug: KitSlug,
    created_at: DateTime<Utc>,
}

impl Kit {
    /// Validate `new` and build the kit it describes.
    pub fn create(id: KitId, new: NewKit, created_at: DateTime<Utc>) -> Result<Self, FieldErrors> {
        new.validate().into_result()?;
        Ok(Self {
            id,
            name: new.name.trim().to_string(),
            description: new.description.trim().to_string(),
            slug: KitSlug(new.slug),
            created_at,
        })
    }

    /// Rebuild a kit from persisted columns.
    pub fn restore(
        id: KitId,
        name: String,
        description: String,
        slug: &str,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name,
            description,
            slug: KitSlug::parse(slug)?,
            created_at,
        })
    }

    pub fn id_typed(&self) -> KitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn slug(&self) -> &KitSlug {
        &self.slug
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Kit {
    type Id = KitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl core::fmt::Display for Kit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}
