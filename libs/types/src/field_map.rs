//! # FieldMap
//!
//! Tag-keyed container of fields and repeating groups. Used for the header,
//! body and trailer of a message and for every group instance.
//!
//! ## Ordering
//!
//! Entries are kept in insertion order. A map may carry a [`FieldOrder`];
//! iteration then yields the listed tags first, in list order, skipping any
//! that are absent, and then every other entry in insertion order. Replacing
//! a field keeps its original position.
//!
//! ## Invariants
//!
//! - A tag appears at most once directly in a map. Setting a tag that is
//!   already present replaces the existing field or group.
//! - Repeated occurrences of a tag live inside [`Group`] instances.
//! - `Clone` is a deep copy: groups and their instances are owned values.

use crate::errors::{ConversionError, FieldError, ValueKind};
use crate::field::Field;
use crate::group::Group;
use crate::tags::{self, Tag};
use crate::value::{FieldValue, MultipleValue, UtcDateOnly, UtcTimeOnly, UtcTimestamp};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Explicit leading field order, shared cheaply between maps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOrder(Arc<[Tag]>);

impl FieldOrder {
    pub fn new(tags: &[Tag]) -> Self {
        Self(Arc::from(tags))
    }

    pub fn tags(&self) -> &[Tag] {
        &self.0
    }

    /// Position of `tag` in the order list.
    pub fn position(&self, tag: Tag) -> Option<usize> {
        self.0.iter().position(|t| *t == tag)
    }
}

/// A field or a repeating group stored directly in a map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Field(Field),
    Group(Group),
}

impl Entry {
    /// The field tag, or the count tag of a group.
    pub fn tag(&self) -> Tag {
        match self {
            Entry::Field(field) => field.tag(),
            Entry::Group(group) => group.count_tag(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    entries: Vec<Entry>,
    order: Option<FieldOrder>,
}

// Two maps are equal when they hold equal entries in the same wire order.
impl PartialEq for FieldMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for FieldMap {}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(order: FieldOrder) -> Self {
        Self {
            entries: Vec::new(),
            order: Some(order),
        }
    }

    pub fn order(&self) -> Option<&FieldOrder> {
        self.order.as_ref()
    }

    pub fn set_order(&mut self, order: Option<FieldOrder>) {
        self.order = order;
    }

    fn position(&self, tag: Tag) -> Option<usize> {
        self.entries.iter().position(|e| e.tag() == tag)
    }

    fn put(&mut self, entry: Entry) {
        match self.position(entry.tag()) {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
    }

    // -- raw fields ---------------------------------------------------------

    /// Set a field, replacing any field or group with the same tag.
    pub fn set_field(&mut self, field: Field) {
        self.put(Entry::Field(field));
    }

    pub fn get_field(&self, tag: Tag) -> Result<&Field, FieldError> {
        self.entries
            .iter()
            .find_map(|e| match e {
                Entry::Field(field) if field.tag() == tag => Some(field),
                _ => None,
            })
            .ok_or(FieldError::NotFound { tag })
    }

    /// Raw wire bytes of `tag`.
    pub fn get_bytes(&self, tag: Tag) -> Result<&[u8], FieldError> {
        self.get_field(tag).map(Field::value)
    }

    /// Remove a field or group. Returns whether anything was removed.
    pub fn remove_field(&mut self, tag: Tag) -> bool {
        match self.position(tag) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether a field or group with `tag` is present.
    pub fn is_set(&self, tag: Tag) -> bool {
        self.position(tag).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of direct entries (fields plus groups).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        let order = self.order.as_ref().map_or(&[][..], FieldOrder::tags);
        let ordered = order
            .iter()
            .filter_map(move |tag| self.entries.iter().find(|e| e.tag() == *tag));
        let rest = self.entries.iter().filter(move |e| !order.contains(&e.tag()));
        ordered.chain(rest)
    }

    /// Tags in wire order.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.iter().map(Entry::tag)
    }

    /// Fields only, in wire order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.iter().filter_map(|e| match e {
            Entry::Field(field) => Some(field),
            Entry::Group(_) => None,
        })
    }

    // -- typed access -------------------------------------------------------

    pub fn set<V: FieldValue>(&mut self, tag: Tag, value: &V) {
        self.set_field(Field::from_value(tag, value));
    }

    pub fn get<V: FieldValue>(&self, tag: Tag) -> Result<V, FieldError> {
        self.get_field(tag)?.decode()
    }

    pub fn set_str(&mut self, tag: Tag, value: &str) {
        self.set_field(Field::new(tag, value.as_bytes()));
    }

    pub fn get_str(&self, tag: Tag) -> Result<&str, FieldError> {
        let field = self.get_field(tag)?;
        std::str::from_utf8(field.value()).map_err(|_| {
            FieldError::conversion(
                tag,
                ConversionError::new(ValueKind::String, field.value()),
            )
        })
    }

    pub fn get_string(&self, tag: Tag) -> Result<String, FieldError> {
        self.get(tag)
    }

    pub fn set_int(&mut self, tag: Tag, value: i64) {
        self.set(tag, &value);
    }

    pub fn get_int(&self, tag: Tag) -> Result<i64, FieldError> {
        self.get(tag)
    }

    pub fn set_uint(&mut self, tag: Tag, value: u64) {
        self.set(tag, &value);
    }

    pub fn get_uint(&self, tag: Tag) -> Result<u64, FieldError> {
        self.get(tag)
    }

    pub fn set_decimal(&mut self, tag: Tag, value: Decimal) {
        self.set(tag, &value);
    }

    pub fn get_decimal(&self, tag: Tag) -> Result<Decimal, FieldError> {
        self.get(tag)
    }

    pub fn set_bool(&mut self, tag: Tag, value: bool) {
        self.set(tag, &value);
    }

    pub fn get_bool(&self, tag: Tag) -> Result<bool, FieldError> {
        self.get(tag)
    }

    pub fn set_char(&mut self, tag: Tag, value: char) {
        self.set(tag, &value);
    }

    pub fn get_char(&self, tag: Tag) -> Result<char, FieldError> {
        self.get(tag)
    }

    pub fn set_utc_timestamp(&mut self, tag: Tag, value: UtcTimestamp) {
        self.set(tag, &value);
    }

    pub fn get_utc_timestamp(&self, tag: Tag) -> Result<UtcTimestamp, FieldError> {
        self.get(tag)
    }

    pub fn set_utc_time_only(&mut self, tag: Tag, value: UtcTimeOnly) {
        self.set(tag, &value);
    }

    pub fn get_utc_time_only(&self, tag: Tag) -> Result<UtcTimeOnly, FieldError> {
        self.get(tag)
    }

    pub fn set_utc_date_only(&mut self, tag: Tag, value: UtcDateOnly) {
        self.set(tag, &value);
    }

    pub fn get_utc_date_only(&self, tag: Tag) -> Result<UtcDateOnly, FieldError> {
        self.get(tag)
    }

    pub fn get_multiple_value(&self, tag: Tag) -> Result<MultipleValue, FieldError> {
        self.get(tag)
    }

    /// Set a raw data field and its paired length field.
    ///
    /// The length is the byte count of `data`. Standard pairs
    /// (RawDataLength/RawData, SecureDataLen/SecureData, ...) are looked up
    /// from the data tag.
    pub fn set_data(&mut self, length_tag: Tag, data_tag: Tag, data: &[u8]) {
        self.set_uint(length_tag, data.len() as u64);
        self.set_field(Field::new(data_tag, data));
    }

    /// [`Self::set_data`] for one of the standard length/data pairs.
    pub fn set_standard_data(&mut self, data_tag: Tag, data: &[u8]) -> Result<(), FieldError> {
        let length_tag = tags::STANDARD_DATA_PAIRS
            .iter()
            .find(|(_, d)| *d == data_tag)
            .map(|(len, _)| *len)
            .ok_or(FieldError::NotFound { tag: data_tag })?;
        self.set_data(length_tag, data_tag, data);
        Ok(())
    }

    // -- groups -------------------------------------------------------------

    /// Set a group, replacing any field or group with its count tag.
    pub fn set_group(&mut self, group: Group) {
        self.put(Entry::Group(group));
    }

    pub fn get_group(&self, count_tag: Tag) -> Result<&Group, FieldError> {
        self.entries
            .iter()
            .find_map(|e| match e {
                Entry::Group(group) if group.count_tag() == count_tag => Some(group),
                _ => None,
            })
            .ok_or(FieldError::NotFound { tag: count_tag })
    }

    pub fn get_group_mut(&mut self, count_tag: Tag) -> Result<&mut Group, FieldError> {
        self.entries
            .iter_mut()
            .find_map(|e| match e {
                Entry::Group(group) if group.count_tag() == count_tag => Some(group),
                _ => None,
            })
            .ok_or(FieldError::NotFound { tag: count_tag })
    }

    /// Append an instance to the group at `count_tag`, creating the group
    /// with `delimiter` when it does not exist yet.
    pub fn add_group_instance(
        &mut self,
        count_tag: Tag,
        delimiter: Tag,
        instance: FieldMap,
    ) -> Result<(), FieldError> {
        if self.get_group(count_tag).is_err() {
            self.set_group(Group::new(count_tag, delimiter));
        }
        self.get_group_mut(count_tag)?.add(instance)
    }

    /// Number of instances of the group at `count_tag`, 0 when absent.
    pub fn group_count(&self, count_tag: Tag) -> usize {
        self.get_group(count_tag).map_or(0, Group::len)
    }

    // -- serialization ------------------------------------------------------

    /// Append every entry in wire order. Groups write their count field
    /// followed by each instance.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.write_filtered(out, &[]);
    }

    /// [`Self::write_to`] skipping the direct entries listed in `skip`.
    pub fn write_filtered(&self, out: &mut Vec<u8>, skip: &[Tag]) {
        for entry in self.iter() {
            if skip.contains(&entry.tag()) {
                continue;
            }
            match entry {
                Entry::Field(field) => field.write_to(out),
                Entry::Group(group) => group.write_to(out),
            }
        }
    }
}
