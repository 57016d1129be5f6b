// SPDX-License-Identifier: MIT OR Apache-2.0

//! The minimal user contract the core requires, and a default implementation of it.

use std::fmt;

/// What the core needs from a codec-defined user type.
///
/// `id` must be greater than zero and unique within a session; `name` must be non-empty and
/// unique within a session. [`crate::user_table::UserTable`] enforces both.
pub trait SessionUser: Clone + fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> u64;
    fn name(&self) -> &str;
}

/// Properties parsed from a `sync-user` node (or supplied to [`crate::session::Session::add_user`]),
/// before construction and validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserProperties {
    pub id: Option<u64>,
    pub name: Option<String>,
}

impl UserProperties {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
        }
    }
}

/// A plain user record satisfying [`SessionUser`], used by [`crate::codec::DefaultCodec`] and
/// throughout the test suite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultUser {
    id: u64,
    name: String,
}

impl DefaultUser {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl SessionUser for DefaultUser {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}
