//! Remote property types and their wire keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Property type of a column as the remote store names it.
///
/// Serialized names match the remote's `type` field exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Title,
    RichText,
    Number,
    Checkbox,
    Date,
    Url,
    Email,
    PhoneNumber,
    Select,
    Status,
    MultiSelect,
    People,
    Files,
    Relation,
    CreatedTime,
    LastEditedTime,
    CreatedBy,
    LastEditedBy,
    UniqueId,
}

impl PropertyType {
    /// Every supported property type, in declaration order.
    pub const ALL: [PropertyType; 19] = [
        PropertyType::Title,
        PropertyType::RichText,
        PropertyType::Number,
        PropertyType::Checkbox,
        PropertyType::Date,
        PropertyType::Url,
        PropertyType::Email,
        PropertyType::PhoneNumber,
        PropertyType::Select,
        PropertyType::Status,
        PropertyType::MultiSelect,
        PropertyType::People,
        PropertyType::Files,
        PropertyType::Relation,
        PropertyType::CreatedTime,
        PropertyType::LastEditedTime,
        PropertyType::CreatedBy,
        PropertyType::LastEditedBy,
        PropertyType::UniqueId,
    ];

    /// The JSON key under which this type's payload, schema config and
    /// filter condition live.
    #[must_use]
    pub const fn wire_key(self) -> &'static str {
        match self {
            PropertyType::Title => "title",
            PropertyType::RichText => "rich_text",
            PropertyType::Number => "number",
            PropertyType::Checkbox => "checkbox",
            PropertyType::Date => "date",
            PropertyType::Url => "url",
            PropertyType::Email => "email",
            PropertyType::PhoneNumber => "phone_number",
            PropertyType::Select => "select",
            PropertyType::Status => "status",
            PropertyType::MultiSelect => "multi_select",
            PropertyType::People => "people",
            PropertyType::Files => "files",
            PropertyType::Relation => "relation",
            PropertyType::CreatedTime => "created_time",
            PropertyType::LastEditedTime => "last_edited_time",
            PropertyType::CreatedBy => "created_by",
            PropertyType::LastEditedBy => "last_edited_by",
            PropertyType::UniqueId => "unique_id",
        }
    }

    /// Inverse of [`wire_key`](Self::wire_key).
    #[must_use]
    pub fn from_wire_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.wire_key() == key)
    }

    /// System-maintained types that callers can never write.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            PropertyType::CreatedTime
                | PropertyType::LastEditedTime
                | PropertyType::CreatedBy
                | PropertyType::LastEditedBy
                | PropertyType::UniqueId
        )
    }

    /// Types whose ordering comparisons use the date operator vocabulary.
    #[must_use]
    pub const fn is_date_like(self) -> bool {
        matches!(
            self,
            PropertyType::Date | PropertyType::CreatedTime | PropertyType::LastEditedTime
        )
    }

    /// Types whose ordering comparisons use the numeric operator vocabulary.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, PropertyType::Number | PropertyType::UniqueId)
    }

    /// User-attribution types (`people`, `created_by`, `last_edited_by`).
    #[must_use]
    pub const fn is_attribution(self) -> bool {
        matches!(
            self,
            PropertyType::People | PropertyType::CreatedBy | PropertyType::LastEditedBy
        )
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_key_roundtrips_for_every_type() {
        for ty in PropertyType::ALL {
            assert_eq!(PropertyType::from_wire_key(ty.wire_key()), Some(ty));
        }
        assert_eq!(PropertyType::from_wire_key("formula"), None);
    }

    #[test]
    fn serde_name_matches_wire_key() {
        for ty in PropertyType::ALL {
            let s = serde_json::to_value(ty).unwrap();
            assert_eq!(s.as_str(), Some(ty.wire_key()));
        }
    }

    #[test]
    fn read_only_set() {
        let read_only: Vec<_> = PropertyType::ALL
            .into_iter()
            .filter(|t| t.is_read_only())
            .collect();
        assert_eq!(
            read_only,
            vec![
                PropertyType::CreatedTime,
                PropertyType::LastEditedTime,
                PropertyType::CreatedBy,
                PropertyType::LastEditedBy,
                PropertyType::UniqueId,
            ]
        );
    }
}
