use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::guard::{Capability, TenantOwned};

/// Courses and live sessions share one table; the kind decides which capability manages them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "course_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CourseKind {
    Course,
    Session,
}

impl CourseKind {
    pub fn manage_capability(self) -> Capability {
        match self {
            CourseKind::Course => Capability::ManageCourses,
            CourseKind::Session => Capability::ManageSessions,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CourseKind::Course => "Course",
            CourseKind::Session => "Session",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Course {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: i64,
    pub kind: CourseKind,
    pub title: String,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub category_id: Option<i64>,
    #[serde(rename = "category")]
    pub category_uuid: Option<Uuid>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantOwned for Course {
    const KIND: &'static str = "Course";

    fn organization_id(&self) -> Option<i64> {
        Some(self.organization_id)
    }
}

/// Editable course fields; PUT replaces all of them
#[derive(Debug, Clone)]
pub struct CourseInput {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub published: bool,
}
