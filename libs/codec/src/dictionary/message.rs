//! Message, section and group layouts

use fix_types::Tag;
use std::collections::{BTreeMap, HashSet};

/// Ordered members of a message section or group instance
///
/// `members` lists every tag in declared order, including the count tags of
/// nested groups. `required` keeps declared order too, so the first missing
/// tag can be reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    members: Vec<Tag>,
    member_set: HashSet<Tag>,
    required: Vec<Tag>,
    groups: BTreeMap<Tag, GroupDef>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a member. Redeclaring a tag only updates `required`.
    pub fn add_field(&mut self, tag: Tag, required: bool) {
        if self.member_set.insert(tag) {
            self.members.push(tag);
        }
        if required && !self.required.contains(&tag) {
            self.required.push(tag);
        }
    }

    pub fn add_group(&mut self, group: GroupDef, required: bool) {
        self.add_field(group.count_tag, required);
        self.groups.insert(group.count_tag, group);
    }

    pub fn members(&self) -> &[Tag] {
        &self.members
    }

    pub fn required(&self) -> &[Tag] {
        &self.required
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.member_set.contains(&tag)
    }

    pub fn is_required(&self, tag: Tag) -> bool {
        self.required.contains(&tag)
    }

    /// Position of `tag` in declared order.
    pub fn position(&self, tag: Tag) -> Option<usize> {
        if !self.contains(tag) {
            return None;
        }
        self.members.iter().position(|t| *t == tag)
    }

    pub fn group(&self, count_tag: Tag) -> Option<&GroupDef> {
        self.groups.get(&count_tag)
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupDef> {
        self.groups.values()
    }

    pub(crate) fn groups_mut(&mut self) -> impl Iterator<Item = &mut GroupDef> {
        self.groups.values_mut()
    }
}

/// Layout of a repeating group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDef {
    pub count_tag: Tag,
    pub delimiter: Tag,
    /// Qualified position, e.g. `"D/453"` or `"V/146/555"`
    pub path: String,
    pub fields: FieldSet,
}

impl GroupDef {
    /// A group whose first member is the delimiter.
    pub fn new(count_tag: Tag, delimiter: Tag) -> Self {
        let mut fields = FieldSet::new();
        fields.add_field(delimiter, true);
        Self {
            count_tag,
            delimiter,
            path: count_tag.to_string(),
            fields,
        }
    }

    pub fn field(mut self, tag: Tag, required: bool) -> Self {
        self.fields.add_field(tag, required);
        self
    }

    pub fn group(mut self, group: GroupDef, required: bool) -> Self {
        self.fields.add_group(group, required);
        self
    }

    /// Recompute `path` for this group and every nested group under `parent`.
    pub(crate) fn qualify(&mut self, parent: &str) {
        self.path = format!("{parent}/{}", self.count_tag);
        let path = self.path.clone();
        for nested in self.fields.groups_mut() {
            nested.qualify(&path);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCategory {
    Admin,
    App,
}

/// Layout of one message type's body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDef {
    pub msg_type: String,
    pub name: String,
    pub category: MessageCategory,
    pub fields: FieldSet,
}

impl MessageDef {
    pub fn new(msg_type: impl Into<String>, name: impl Into<String>, category: MessageCategory) -> Self {
        Self {
            msg_type: msg_type.into(),
            name: name.into(),
            category,
            fields: FieldSet::new(),
        }
    }

    pub fn field(mut self, tag: Tag, required: bool) -> Self {
        self.fields.add_field(tag, required);
        self
    }

    pub fn group(mut self, group: GroupDef, required: bool) -> Self {
        self.fields.add_group(group, required);
        self
    }

    pub(crate) fn qualify_groups(&mut self) {
        let parent = self.msg_type.clone();
        for group in self.fields.groups_mut() {
            group.qualify(&parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_delimiter_is_first_member() {
        let group = GroupDef::new(453, 448).field(447, false).field(452, false);
        assert_eq!(group.fields.members(), &[448, 447, 452]);
        assert_eq!(group.fields.position(452), Some(2));
        assert!(group.fields.is_required(448));
    }

    #[test]
    fn test_nested_paths() {
        let legs = GroupDef::new(555, 600).group(GroupDef::new(539, 524), false);
        let mut def = MessageDef::new("AB", "NewOrderMultileg", MessageCategory::App).group(legs, false);
        def.qualify_groups();
        let legs = def.fields.group(555).unwrap();
        assert_eq!(legs.path, "AB/555");
        assert_eq!(legs.fields.group(539).unwrap().path, "AB/555/539");
    }

    #[test]
    fn test_required_keeps_declared_order() {
        let mut set = FieldSet::new();
        set.add_field(55, true);
        set.add_field(11, true);
        set.add_field(38, false);
        set.add_field(55, true);
        assert_eq!(set.required(), &[55, 11]);
        assert_eq!(set.members(), &[55, 11, 38]);
    }
}
