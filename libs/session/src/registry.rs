//! Session Registry
//!
//! Process-wide lookup of live sessions by [`SessionId`]. Sessions are
//! registered once built and deregistered when closed; lookups never block
//! one another.

use crate::error::{Result, SessionError};
use crate::session::Session;
use dashmap::DashMap;
use fix_types::tags;
use fix_types::{Message, SessionId};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: Arc<Session>) -> Result<()> {
        let session_id = session.session_id().clone();
        match self.sessions.entry(session_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SessionError::DuplicateSession { session_id }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                info!(session = %session_id, "Registered session");
                Ok(())
            }
        }
    }

    pub fn deregister(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(session_id).map(|(_, session)| session);
        if removed.is_some() {
            info!(session = %session_id, "Deregistered session");
        }
        removed
    }

    pub fn lookup(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Send through the session named by the header's BeginString and
    /// Sender/Target IDs, as seen from this side.
    pub fn send_to_target(&self, message: Message) -> Result<bool> {
        let session_id = Self::route(&message);
        let session = self
            .lookup(&session_id)
            .or_else(|| self.find_qualified(&session_id))
            .ok_or(SessionError::UnknownSession { session_id })?;
        debug!(session = %session.session_id(), "Routing message to session");
        session.send(message)
    }

    fn route(message: &Message) -> SessionId {
        let header = message.header();
        let text = |tag| header.get_str(tag).ok().map(str::to_string);
        SessionId {
            begin_string: text(tags::BEGIN_STRING).unwrap_or_default(),
            sender_comp_id: text(tags::SENDER_COMP_ID).unwrap_or_default(),
            sender_sub_id: text(tags::SENDER_SUB_ID),
            sender_location_id: text(tags::SENDER_LOCATION_ID),
            target_comp_id: text(tags::TARGET_COMP_ID).unwrap_or_default(),
            target_sub_id: text(tags::TARGET_SUB_ID),
            target_location_id: text(tags::TARGET_LOCATION_ID),
            qualifier: None,
        }
    }

    /// A lone session that differs from `unqualified` only by qualifier.
    fn find_qualified(&self, unqualified: &SessionId) -> Option<Arc<Session>> {
        let mut matches = self.sessions.iter().filter(|entry| {
            let key = entry.key();
            key.qualifier.is_some()
                && SessionId {
                    qualifier: None,
                    ..key.clone()
                } == *unqualified
        });
        let found = matches.next().map(|entry| Arc::clone(entry.value()));
        match matches.next() {
            Some(_) => None,
            None => found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Application;
    use crate::error::ApplicationError;
    use fix_config::{ConnectionType, SessionSettings};
    use fix_types::tags::msg_type;

    struct Quiet;

    impl Application for Quiet {
        fn on_logon(&self, _: &SessionId) {}
        fn on_logout(&self, _: &SessionId) {}
        fn from_app(&self, _: &Message, _: &SessionId) -> std::result::Result<(), ApplicationError> {
            Ok(())
        }
    }

    fn session(target: &str, qualifier: Option<&str>) -> Arc<Session> {
        let mut settings = SessionSettings::new("FIX.4.4", "ME", target, ConnectionType::Initiator);
        settings.session_qualifier = qualifier.map(str::to_string);
        Session::builder(settings, Arc::new(Quiet)).build().unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = SessionRegistry::new();
        let first = session("A", None);
        registry.register(Arc::clone(&first)).unwrap();
        registry.register(session("B", None)).unwrap();

        assert!(matches!(
            registry.register(session("A", None)),
            Err(SessionError::DuplicateSession { .. })
        ));
        assert_eq!(registry.len(), 2);
        let found = registry.lookup(first.session_id()).unwrap();
        assert!(Arc::ptr_eq(&found, &first));

        assert!(registry.deregister(first.session_id()).is_some());
        assert!(registry.lookup(first.session_id()).is_none());
        assert_eq!(
            registry.session_ids(),
            vec![SessionId::new("FIX.4.4", "ME", "B")]
        );
    }

    #[test]
    fn test_send_to_target_routes_by_header() {
        let registry = SessionRegistry::new();
        let target = session("A", Some("primary"));
        registry.register(Arc::clone(&target)).unwrap();

        let mut order = Message::with_type("FIX.4.4", msg_type::NEW_ORDER_SINGLE);
        order.header_mut().set_str(tags::SENDER_COMP_ID, "ME");
        order.header_mut().set_str(tags::TARGET_COMP_ID, "A");
        // not logged on: stored but not transmitted
        assert!(!registry.send_to_target(order).unwrap());
        assert_eq!(target.next_sender_seq_num(), 2);

        let mut stray = Message::with_type("FIX.4.4", msg_type::NEW_ORDER_SINGLE);
        stray.header_mut().set_str(tags::SENDER_COMP_ID, "ME");
        stray.header_mut().set_str(tags::TARGET_COMP_ID, "Z");
        assert!(matches!(
            registry.send_to_target(stray),
            Err(SessionError::UnknownSession { .. })
        ));
    }
}
