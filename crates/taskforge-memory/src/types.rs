//! Query filter types used by the store's indexed-filter operations
//! (spec §4.3 `get_by_category/time_range/content_type/source`).

use chrono::{DateTime, Utc};
use taskforge_core::types::{ContentType, MemoryCategory, MemorySource};

#[derive(Debug, Clone, Default)]
pub struct MemoryFilters {
    pub category: Option<MemoryCategory>,
    pub source: Option<MemorySource>,
    pub content_type: Option<ContentType>,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl MemoryFilters {
    pub fn matches(
        &self,
        category: MemoryCategory,
        source: MemorySource,
        content_type: ContentType,
        created_at: DateTime<Utc>,
    ) -> bool {
        if let Some(c) = self.category {
            if c != category {
                return false;
            }
        }
        if let Some(s) = self.source {
            if s != source {
                return false;
            }
        }
        if let Some(ct) = self.content_type {
            if ct != content_type {
                return false;
            }
        }
        if let Some((start, end)) = self.time_range {
            if created_at < start || created_at > end {
                return false;
            }
        }
        true
    }
}

/// Options accepted by `MemoryStore::set`.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub content_type: Option<ContentType>,
    pub category: Option<MemoryCategory>,
    pub source: Option<MemorySource>,
    pub session_id: Option<String>,
    pub image_path: Option<String>,
    pub embedding: Option<Vec<f32>>,
}
