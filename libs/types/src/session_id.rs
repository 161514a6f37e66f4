//! Session identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one logical counterparty session
///
/// Immutable once built; used as the key for session state, the message
/// store and the session registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId {
    pub begin_string: String,
    pub sender_comp_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_sub_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_location_id: Option<String>,
    pub target_comp_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sub_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_location_id: Option<String>,
    /// Distinguishes otherwise identical sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl SessionId {
    pub fn new(
        begin_string: impl Into<String>,
        sender_comp_id: impl Into<String>,
        target_comp_id: impl Into<String>,
    ) -> Self {
        Self {
            begin_string: begin_string.into(),
            sender_comp_id: sender_comp_id.into(),
            sender_sub_id: None,
            sender_location_id: None,
            target_comp_id: target_comp_id.into(),
            target_sub_id: None,
            target_location_id: None,
            qualifier: None,
        }
    }

    pub fn with_sender_sub_id(mut self, id: impl Into<String>) -> Self {
        self.sender_sub_id = Some(id.into());
        self
    }

    pub fn with_sender_location_id(mut self, id: impl Into<String>) -> Self {
        self.sender_location_id = Some(id.into());
        self
    }

    pub fn with_target_sub_id(mut self, id: impl Into<String>) -> Self {
        self.target_sub_id = Some(id.into());
        self
    }

    pub fn with_target_location_id(mut self, id: impl Into<String>) -> Self {
        self.target_location_id = Some(id.into());
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// The same session seen from the counterparty.
    pub fn reverse(&self) -> Self {
        Self {
            begin_string: self.begin_string.clone(),
            sender_comp_id: self.target_comp_id.clone(),
            sender_sub_id: self.target_sub_id.clone(),
            sender_location_id: self.target_location_id.clone(),
            target_comp_id: self.sender_comp_id.clone(),
            target_sub_id: self.sender_sub_id.clone(),
            target_location_id: self.sender_location_id.clone(),
            qualifier: self.qualifier.clone(),
        }
    }

    pub fn is_fixt(&self) -> bool {
        self.begin_string.starts_with("FIXT")
    }
}

fn write_party(
    f: &mut fmt::Formatter<'_>,
    comp: &str,
    sub: &Option<String>,
    location: &Option<String>,
) -> fmt::Result {
    f.write_str(comp)?;
    if let Some(sub) = sub {
        write!(f, "/{sub}")?;
    }
    if let Some(location) = location {
        write!(f, "/{location}")?;
    }
    Ok(())
}

/// `FIX.4.4:SENDER->TARGET`, with `/sub/location` parts and `:qualifier`
/// appended when present.
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.begin_string)?;
        write_party(f, &self.sender_comp_id, &self.sender_sub_id, &self.sender_location_id)?;
        f.write_str("->")?;
        write_party(f, &self.target_comp_id, &self.target_sub_id, &self.target_location_id)?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, ":{qualifier}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_display() {
        let id = SessionId::new("FIX.4.4", "BANZAI", "EXEC");
        assert_eq!(id.to_string(), "FIX.4.4:BANZAI->EXEC");

        let id = id.with_sender_sub_id("DESK").with_qualifier("primary");
        assert_eq!(id.to_string(), "FIX.4.4:BANZAI/DESK->EXEC:primary");
    }

    #[test]
    fn test_reverse_swaps_parties() {
        let id = SessionId::new("FIXT.1.1", "A", "B").with_target_location_id("LDN");
        let reversed = id.reverse();
        assert_eq!(reversed.sender_comp_id, "B");
        assert_eq!(reversed.sender_location_id.as_deref(), Some("LDN"));
        assert_eq!(reversed.target_comp_id, "A");
        assert_eq!(reversed.reverse(), id);
        assert!(id.is_fixt());
    }

    #[test]
    fn test_optional_parts_distinguish_keys() {
        let plain = SessionId::new("FIX.4.2", "A", "B");
        let with_sub = plain.clone().with_target_sub_id("X");
        let set: HashSet<_> = [plain, with_sub].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
