// SPDX-License-Identifier: MIT OR Apache-2.0

//! The payload codec extension point: the part of the protocol a concrete session type supplies.

use crate::connection::Connection;
use crate::error::SessionError;
use crate::session::Session;
use crate::user::{SessionUser, UserProperties};
use crate::xml::XmlNode;

pub(crate) mod tags {
    pub const SYNC_USER: &str = "sync-user";
}

pub(crate) mod attrs {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
}

/// Adapts the generic sync framing to a concrete document type.
///
/// Implementations are expected to be cheap to [`Clone`] (the reference implementation below is
/// zero-sized): the engine briefly moves a codec instance out of the session so it can call a
/// method that itself needs `&mut Session` without aliasing it.
pub trait PayloadCodec<Conn: Connection>: Clone + Send + Sync + 'static {
    type User: SessionUser;

    /// Serialize this session's snapshot to an ordered list of body nodes, sent after
    /// `sync-begin` and before `sync-end` during an outbound sync.
    ///
    /// Default: one `sync-user` node per table entry, via [`PayloadCodec::user_to_xml`]. A
    /// concrete codec overrides this to append buffer-derived nodes after the user nodes.
    fn emit_snapshot(&self, session: &Session<Conn, Self>) -> Vec<XmlNode> {
        session
            .user_table()
            .iter()
            .map(|user| {
                let mut node = XmlNode::new(tags::SYNC_USER);
                self.user_to_xml(session, user, &mut node);
                node
            })
            .collect()
    }

    /// Handle one body message during an inbound sync.
    ///
    /// Default: recognizes `sync-user`, parses/validates/constructs/inserts the user. Any other
    /// tag is an [`SessionError::UnexpectedNode`].
    fn process_sync_message(
        &self,
        session: &mut Session<Conn, Self>,
        connection: &Conn,
        node: &XmlNode,
    ) -> Result<(), SessionError> {
        if node.tag() != tags::SYNC_USER {
            return Err(SessionError::UnexpectedNode);
        }

        let props = self.parse_user_properties(session, connection, node)?;
        self.validate_user_properties(session, &props, None)?;
        let user = self.construct_user(session, props)?;
        session.add_user_internal(user);
        Ok(())
    }

    /// Default: reads `id` (unsigned) and `name` (string) attributes.
    fn parse_user_properties(
        &self,
        _session: &Session<Conn, Self>,
        _connection: &Conn,
        node: &XmlNode,
    ) -> Result<UserProperties, SessionError> {
        let id = node
            .attribute_u64(attrs::ID)
            .ok_or(SessionError::IdNotPresent)?;
        let name = node
            .attribute(attrs::NAME)
            .ok_or(SessionError::NameNotPresent)?
            .to_string();
        Ok(UserProperties {
            id: Some(id),
            name: Some(name),
        })
    }

    /// Default: id present & unique, name present & unique. `exclude` lets a caller (re-)validate
    /// properties for a user that's allowed to keep its own id/name (unused by the default sync
    /// path, but available to codecs implementing user-property updates on top of `process_run_message`).
    fn validate_user_properties(
        &self,
        session: &Session<Conn, Self>,
        props: &UserProperties,
        exclude: Option<&Self::User>,
    ) -> Result<(), SessionError> {
        let id = props.id.ok_or(SessionError::IdNotPresent)?;
        let name = props.name.as_deref().ok_or(SessionError::NameNotPresent)?;

        if id == 0 {
            return Err(SessionError::IdNotPresent);
        }

        if let Some(existing) = session.user_table().lookup_by_id(id) {
            if exclude.map(|u| u.id()) != Some(existing.id()) {
                return Err(SessionError::IdInUse(id));
            }
        }

        if let Some(existing) = session.user_table().lookup_by_name(name) {
            if exclude.map(|u| u.name()) != Some(existing.name()) {
                return Err(SessionError::NameInUse(name.to_string()));
            }
        }

        Ok(())
    }

    /// Default: writes `id` and `name` attributes.
    fn user_to_xml(&self, _session: &Session<Conn, Self>, user: &Self::User, node: &mut XmlNode) {
        node.set_attribute(attrs::ID, user.id().to_string());
        node.set_attribute(attrs::NAME, user.name().to_string());
    }

    /// No default: the subclass alone knows how to build its user type from parsed properties.
    fn construct_user(
        &self,
        session: &Session<Conn, Self>,
        props: UserProperties,
    ) -> Result<Self::User, SessionError>;

    /// No default: invoked only while Running, for any inbound node that isn't a `sync-error` on
    /// a connection with an active OutboundSync.
    fn process_run_message(&self, session: &mut Session<Conn, Self>, connection: &Conn, node: &XmlNode);

    /// Overridable pre-close hook, invoked synchronously at the very start of
    /// [`Session::close`], before the generic teardown sequence runs. Default: no-op.
    ///
    /// The generic teardown itself (sending the appropriate `sync-error`/`sync-cancel`,
    /// releasing connections, emitting `sync-failed`) always runs regardless of what this hook
    /// does — it isn't a replacement for §4.5, only a place to release codec-specific resources
    /// ahead of it.
    fn close(&self, session: &mut Session<Conn, Self>)
    where
        Self: Sized,
    {
        let _ = session;
    }
}

/// The baseline codec: understands users and nothing else. `process_run_message` is a no-op and
/// `construct_user` builds a [`crate::user::DefaultUser`] straight from the parsed properties.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCodec;

impl<Conn: Connection> PayloadCodec<Conn> for DefaultCodec {
    type User = crate::user::DefaultUser;

    fn construct_user(
        &self,
        _session: &Session<Conn, Self>,
        props: UserProperties,
    ) -> Result<Self::User, SessionError> {
        let id = props.id.ok_or(SessionError::IdNotPresent)?;
        let name = props.name.ok_or(SessionError::NameNotPresent)?;
        Ok(crate::user::DefaultUser::new(id, name))
    }

    fn process_run_message(
        &self,
        _session: &mut Session<Conn, Self>,
        _connection: &Conn,
        _node: &XmlNode,
    ) {
    }
}
