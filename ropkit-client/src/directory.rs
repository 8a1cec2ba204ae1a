//! Read-only directory of well-known named property tags.

use ropkit_protocol::{tags, PropertyTag};

/// Named tags known to this client.
static DIRECTORY: &[(&str, PropertyTag)] = &[
    ("PidTagMemberId", tags::PID_TAG_MEMBER_ID),
    ("PidTagMemberName", tags::PID_TAG_MEMBER_NAME),
    ("PidTagMemberRights", tags::PID_TAG_MEMBER_RIGHTS),
    ("PidTagEntryId", tags::PID_TAG_ENTRY_ID),
    ("PidTagRuleId", tags::PID_TAG_RULE_ID),
    ("PidTagRuleSequence", tags::PID_TAG_RULE_SEQUENCE),
    ("PidTagRuleState", tags::PID_TAG_RULE_STATE),
    ("PidTagRuleName", tags::PID_TAG_RULE_NAME),
    ("PidTagSubject", tags::PID_TAG_SUBJECT),
    ("PidTagNormalizedSubject", tags::PID_TAG_NORMALIZED_SUBJECT),
    ("PidTagBody", tags::PID_TAG_BODY),
    ("PidTagFolderId", tags::PID_TAG_FOLDER_ID),
];

/// Resolves a symbolic property name to its tag.
pub fn lookup(name: &str) -> Option<PropertyTag> {
    DIRECTORY
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, tag)| *tag)
}

/// Returns every known (name, tag) pair.
pub fn known_tags() -> &'static [(&'static str, PropertyTag)] {
    DIRECTORY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("PidTagMemberId"), Some(tags::PID_TAG_MEMBER_ID));
        assert_eq!(lookup("PidTagNoSuchThing"), None);
    }

    #[test]
    fn test_directory_names_are_unique() {
        let mut names: Vec<_> = known_tags().iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), known_tags().len());
    }
}
