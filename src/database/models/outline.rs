use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::course::CourseKind;
use crate::guard::TenantOwned;

/// Ordered sibling families hanging off a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutlineLevel {
    Section,
    Objective,
    Chapter,
    SubChapter,
}

impl OutlineLevel {
    pub fn table(self) -> &'static str {
        match self {
            OutlineLevel::Section => "sections",
            OutlineLevel::Objective => "objectives",
            OutlineLevel::Chapter => "chapters",
            OutlineLevel::SubChapter => "sub_chapters",
        }
    }

    pub fn parent_column(self) -> &'static str {
        match self {
            OutlineLevel::Section | OutlineLevel::Objective => "course_id",
            OutlineLevel::Chapter => "section_id",
            OutlineLevel::SubChapter => "chapter_id",
        }
    }

    /// Parent family, or None when the parent is the course itself
    pub fn parent_level(self) -> Option<OutlineLevel> {
        match self {
            OutlineLevel::Section | OutlineLevel::Objective => None,
            OutlineLevel::Chapter => Some(OutlineLevel::Section),
            OutlineLevel::SubChapter => Some(OutlineLevel::Chapter),
        }
    }

    /// First position value written by reorder and create
    pub fn position_base(self) -> i32 {
        match self {
            OutlineLevel::Section | OutlineLevel::Chapter => 0,
            OutlineLevel::Objective | OutlineLevel::SubChapter => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutlineLevel::Section => "Section",
            OutlineLevel::Objective => "Objective",
            OutlineLevel::Chapter => "Chapter",
            OutlineLevel::SubChapter => "Sub-chapter",
        }
    }

    pub fn supports_documents(self) -> bool {
        self == OutlineLevel::Chapter
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OutlineNode {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub parent_id: i64,
    #[serde(skip_serializing)]
    pub organization_id: i64,
    #[serde(skip_serializing)]
    pub course_kind: CourseKind,
    pub title: String,
    pub body: Option<String>,
    #[serde(skip_serializing)]
    pub document_id: Option<i64>,
    #[serde(rename = "document")]
    pub document_uuid: Option<Uuid>,
    pub position: i32,
}

impl TenantOwned for OutlineNode {
    const KIND: &'static str = "Outline item";

    fn organization_id(&self) -> Option<i64> {
        Some(self.organization_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewOutlineNode {
    pub title: String,
    pub body: Option<String>,
    pub document_id: Option<i64>,
}
