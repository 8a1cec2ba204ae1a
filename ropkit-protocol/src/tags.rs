//! Well-known property tags exercised by the operation set.

use crate::value::{PropertyTag, PropertyType};

/// Member id of a permissions-table row.
pub const PID_TAG_MEMBER_ID: PropertyTag = PropertyTag::new(0x6671, PropertyType::Integer64);

/// Display name of a permissions-table member.
pub const PID_TAG_MEMBER_NAME: PropertyTag = PropertyTag::new(0x6672, PropertyType::Unicode);

/// Rights mask of a permissions-table member.
pub const PID_TAG_MEMBER_RIGHTS: PropertyTag = PropertyTag::new(0x6673, PropertyType::Integer32);

/// Address-book entry id.
pub const PID_TAG_ENTRY_ID: PropertyTag = PropertyTag::new(0x0FFF, PropertyType::Binary);

/// Rule id of a rules-table row.
pub const PID_TAG_RULE_ID: PropertyTag = PropertyTag::new(0x6674, PropertyType::Integer64);

/// Evaluation order of a rule.
pub const PID_TAG_RULE_SEQUENCE: PropertyTag = PropertyTag::new(0x6676, PropertyType::Integer32);

/// Enabled/error state bits of a rule.
pub const PID_TAG_RULE_STATE: PropertyTag = PropertyTag::new(0x6677, PropertyType::Integer32);

/// Display name of a rule.
pub const PID_TAG_RULE_NAME: PropertyTag = PropertyTag::new(0x6682, PropertyType::Unicode);

/// Message subject.
pub const PID_TAG_SUBJECT: PropertyTag = PropertyTag::new(0x0037, PropertyType::Unicode);

/// Subject with any prefix stripped.
pub const PID_TAG_NORMALIZED_SUBJECT: PropertyTag = PropertyTag::new(0x0E1D, PropertyType::Unicode);

/// Plain-text message body.
pub const PID_TAG_BODY: PropertyTag = PropertyTag::new(0x1000, PropertyType::Unicode);

/// Folder id.
pub const PID_TAG_FOLDER_ID: PropertyTag = PropertyTag::new(0x6748, PropertyType::Integer64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_kinds() {
        assert_eq!(PID_TAG_MEMBER_ID.kind, PropertyType::Integer64);
        assert_eq!(PID_TAG_MEMBER_RIGHTS.kind, PropertyType::Integer32);
        assert_eq!(PID_TAG_ENTRY_ID.kind, PropertyType::Binary);
        assert_eq!(PID_TAG_MEMBER_NAME.kind, PropertyType::Unicode);
    }
}
