//! Explicit dictionary registry
//!
//! Built once from the list of dictionaries the engine serves, then shared
//! by reference. Transport dictionaries are keyed by BeginString,
//! application dictionaries (FIXT.1.1) by ApplVerID.

use super::{DataDictionary, DictionaryError, MessageDef};
use fix_types::tags::begin_string::FIXT11;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct DictionaryRegistry {
    by_begin_string: HashMap<String, Arc<DataDictionary>>,
    by_appl_ver_id: HashMap<String, Arc<DataDictionary>>,
}

impl DictionaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `dictionaries`. A dictionary with an ApplVerID
    /// is registered under the ApplVerID, any other under its BeginString.
    pub fn from_dictionaries<I>(dictionaries: I) -> Result<Self, DictionaryError>
    where
        I: IntoIterator<Item = DataDictionary>,
    {
        let mut registry = Self::new();
        for dictionary in dictionaries {
            registry.register(dictionary)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, dictionary: DataDictionary) -> Result<(), DictionaryError> {
        let dictionary = Arc::new(dictionary);
        match dictionary.appl_ver_id() {
            Some(appl_ver_id) => {
                if self.by_appl_ver_id.contains_key(appl_ver_id) {
                    return Err(DictionaryError::DuplicateDictionary {
                        key: appl_ver_id.to_string(),
                    });
                }
                debug!(appl_ver_id, begin_string = dictionary.begin_string(), "Registered application dictionary");
                self.by_appl_ver_id
                    .insert(appl_ver_id.to_string(), Arc::clone(&dictionary));
            }
            None => {
                let key = dictionary.begin_string().to_string();
                if self.by_begin_string.contains_key(&key) {
                    return Err(DictionaryError::DuplicateDictionary { key });
                }
                debug!(begin_string = %key, "Registered dictionary");
                self.by_begin_string.insert(key, dictionary);
            }
        }
        Ok(())
    }

    /// Dictionary for the session layer of `begin_string`.
    pub fn transport(&self, begin_string: &str) -> Result<Arc<DataDictionary>, DictionaryError> {
        self.by_begin_string
            .get(begin_string)
            .cloned()
            .ok_or_else(|| DictionaryError::UnknownVersion {
                begin_string: begin_string.to_string(),
            })
    }

    pub fn application(&self, appl_ver_id: &str) -> Result<Arc<DataDictionary>, DictionaryError> {
        self.by_appl_ver_id
            .get(appl_ver_id)
            .cloned()
            .ok_or_else(|| DictionaryError::UnknownApplVerId {
                appl_ver_id: appl_ver_id.to_string(),
            })
    }

    /// Transport and application dictionaries for a message.
    ///
    /// Before FIXT both are the BeginString dictionary. Under FIXT.1.1 the
    /// application dictionary comes from the message's ApplVerID, or
    /// `default_appl_ver_id` when the message carries none.
    pub fn resolve(
        &self,
        begin_string: &str,
        appl_ver_id: Option<&str>,
        default_appl_ver_id: Option<&str>,
    ) -> Result<(Arc<DataDictionary>, Arc<DataDictionary>), DictionaryError> {
        let transport = self.transport(begin_string)?;
        if begin_string != FIXT11 {
            return Ok((Arc::clone(&transport), transport));
        }
        match appl_ver_id.or(default_appl_ver_id) {
            Some(id) => Ok((transport, self.application(id)?)),
            None => Ok((Arc::clone(&transport), transport)),
        }
    }

    /// Body layout of `msg_type` for a version key (BeginString or ApplVerID).
    pub fn message_dictionary(
        &self,
        version: &str,
        msg_type: &str,
    ) -> Result<(Arc<DataDictionary>, MessageDef), DictionaryError> {
        let dictionary = self
            .by_begin_string
            .get(version)
            .or_else(|| self.by_appl_ver_id.get(version))
            .cloned()
            .ok_or_else(|| DictionaryError::UnknownVersion {
                begin_string: version.to_string(),
            })?;
        let def = dictionary.message(msg_type)?.clone();
        Ok((dictionary, def))
    }

    pub fn is_empty(&self) -> bool {
        self.by_begin_string.is_empty() && self.by_appl_ver_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{DictionaryBuilder, FieldDef, FieldType, MessageCategory, MessageDef};

    fn fixt() -> DataDictionary {
        DictionaryBuilder::new("FIXT.1.1")
            .standard_header_trailer()
            .session_messages()
            .build()
            .unwrap()
    }

    fn fix50sp2() -> DataDictionary {
        DictionaryBuilder::new("FIX.5.0SP2")
            .appl_ver_id("9")
            .field(FieldDef::new(55, "Symbol", FieldType::String))
            .message(MessageDef::new("D", "NewOrderSingle", MessageCategory::App).field(55, true))
            .build()
            .unwrap()
    }

    #[test]
    fn test_fixt_resolution() {
        let registry = DictionaryRegistry::from_dictionaries([fixt(), fix50sp2()]).unwrap();
        let (transport, app) = registry.resolve("FIXT.1.1", None, Some("9")).unwrap();
        assert_eq!(transport.begin_string(), "FIXT.1.1");
        assert_eq!(app.appl_ver_id(), Some("9"));

        assert!(matches!(
            registry.resolve("FIXT.1.1", Some("7"), None),
            Err(DictionaryError::UnknownApplVerId { .. })
        ));
    }

    #[test]
    fn test_pre_fixt_uses_one_dictionary() {
        let fix44 = DictionaryBuilder::new("FIX.4.4").session_messages().build().unwrap();
        let registry = DictionaryRegistry::from_dictionaries([fix44]).unwrap();
        let (transport, app) = registry.resolve("FIX.4.4", Some("9"), None).unwrap();
        assert!(Arc::ptr_eq(&transport, &app));
        assert!(registry.transport("FIX.4.2").is_err());
    }

    #[test]
    fn test_message_dictionary_lookup() {
        let registry = DictionaryRegistry::from_dictionaries([fixt(), fix50sp2()]).unwrap();
        let (_, def) = registry.message_dictionary("9", "D").unwrap();
        assert_eq!(def.fields.required(), &[55]);
        assert!(registry.message_dictionary("FIXT.1.1", "D").is_err());
    }

    #[test]
    fn test_duplicate_registration() {
        let err = DictionaryRegistry::from_dictionaries([fixt(), fixt()]).unwrap_err();
        assert_eq!(err, DictionaryError::DuplicateDictionary { key: "FIXT.1.1".into() });
    }
}
