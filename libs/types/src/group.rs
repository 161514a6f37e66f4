//! Repeating groups

use crate::errors::FieldError;
use crate::field_map::{FieldMap, FieldOrder};
use crate::tags::Tag;
use std::io::Write;

/// An ordered sequence of [`FieldMap`] instances under a NumInGroup field
///
/// Every instance carries the delimiter tag, and the delimiter is the first
/// tag of the instance's field order, so it is always written first. The
/// count written on the wire is the number of instances.
#[derive(Debug, Clone)]
pub struct Group {
    count_tag: Tag,
    delimiter: Tag,
    order: FieldOrder,
    parent: Option<String>,
    instances: Vec<FieldMap>,
    declared_count: Option<usize>,
}

impl Group {
    pub fn new(count_tag: Tag, delimiter: Tag) -> Self {
        Self::with_member_order(count_tag, delimiter, &[delimiter])
    }

    /// Group whose instances serialize `members` in the given order.
    /// The delimiter is moved to the front if `members` does not start with it.
    pub fn with_member_order(count_tag: Tag, delimiter: Tag, members: &[Tag]) -> Self {
        let mut tags = Vec::with_capacity(members.len() + 1);
        tags.push(delimiter);
        tags.extend(members.iter().copied().filter(|t| *t != delimiter));
        Self {
            count_tag,
            delimiter,
            order: FieldOrder::new(&tags),
            parent: None,
            instances: Vec::new(),
            declared_count: None,
        }
    }

    /// Qualify the group with the path of the component or group containing
    /// it, e.g. `"Parties"` or `"NoLegs/NoLegStipulations"`.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn count_tag(&self) -> Tag {
        self.count_tag
    }

    pub fn delimiter(&self) -> Tag {
        self.delimiter
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// `parent/count_tag`, or just the count tag for top-level groups.
    pub fn qualified_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}/{}", self.count_tag),
            None => self.count_tag.to_string(),
        }
    }

    pub fn member_order(&self) -> &FieldOrder {
        &self.order
    }

    /// A fresh instance with this group's field order.
    pub fn new_instance(&self) -> FieldMap {
        FieldMap::with_order(self.order.clone())
    }

    /// Append an instance. Fails when the instance lacks the delimiter.
    pub fn add(&mut self, mut instance: FieldMap) -> Result<(), FieldError> {
        if !instance.is_set(self.delimiter) {
            return Err(FieldError::MissingDelimiter {
                count_tag: self.count_tag,
                delimiter: self.delimiter,
            });
        }
        instance.set_order(Some(self.order.clone()));
        self.instances.push(instance);
        Ok(())
    }

    /// Instance at `index` (0-based).
    pub fn get(&self, index: usize) -> Result<&FieldMap, FieldError> {
        self.instances
            .get(index)
            .ok_or(FieldError::NotFound { tag: self.count_tag })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut FieldMap, FieldError> {
        self.instances
            .get_mut(index)
            .ok_or(FieldError::NotFound { tag: self.count_tag })
    }

    pub fn remove(&mut self, index: usize) -> Option<FieldMap> {
        (index < self.instances.len()).then(|| self.instances.remove(index))
    }

    pub fn instances(&self) -> &[FieldMap] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// NumInGroup value read from the wire, when this group came from the
    /// parser. Differs from [`Self::len`] when the count was wrong.
    pub fn declared_count(&self) -> Option<usize> {
        self.declared_count
    }

    pub fn set_declared_count(&mut self, count: usize) {
        self.declared_count = Some(count);
    }

    /// Append the count field and every instance.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let _ = write!(out, "{}={}", self.count_tag, self.instances.len());
        out.push(crate::SOH);
        for instance in &self.instances {
            instance.write_to(out);
        }
    }
}

// Content equality: the wire count and parent path are metadata.
impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.count_tag == other.count_tag
            && self.delimiter == other.delimiter
            && self.instances == other.instances
    }
}

impl Eq for Group {}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(id: &str, role: i64) -> FieldMap {
        let mut instance = FieldMap::new();
        instance.set_int(452, role);
        instance.set_str(448, id);
        instance
    }

    #[test]
    fn test_delimiter_is_written_first() {
        let mut group = Group::with_member_order(453, 448, &[448, 447, 452]);
        group.add(party("AAA", 3)).unwrap();
        let mut out = Vec::new();
        group.write_to(&mut out);
        assert_eq!(out, b"453=1\x01448=AAA\x01452=3\x01");
    }

    #[test]
    fn test_instance_without_delimiter_is_refused() {
        let mut group = Group::new(453, 448);
        let mut instance = FieldMap::new();
        instance.set_int(452, 3);
        let err = group.add(instance).unwrap_err();
        assert_eq!(err, FieldError::MissingDelimiter { count_tag: 453, delimiter: 448 });
        assert!(group.is_empty());
    }

    #[test]
    fn test_clone_is_deep() {
        let mut inner = Group::new(804, 545);
        let mut sub = FieldMap::new();
        sub.set_str(545, "SUB1");
        inner.add(sub).unwrap();

        let mut instance = party("AAA", 3);
        instance.set_group(inner);
        let mut group = Group::new(453, 448);
        group.add(instance).unwrap();

        let mut copy = group.clone();
        copy.get_mut(0)
            .unwrap()
            .get_group_mut(804)
            .unwrap()
            .get_mut(0)
            .unwrap()
            .set_str(545, "CHANGED");

        let original = group.get(0).unwrap().get_group(804).unwrap().get(0).unwrap();
        assert_eq!(original.get_str(545).unwrap(), "SUB1");
        assert_ne!(copy, group);
    }

    #[test]
    fn test_qualified_name() {
        let group = Group::new(539, 524).with_parent("NestedParties");
        assert_eq!(group.qualified_name(), "NestedParties/539");
        assert_eq!(Group::new(453, 448).qualified_name(), "453");
    }
}
