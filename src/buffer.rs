// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

/// Opaque document store handle.
///
/// The core never reads or writes buffer contents; it only holds a handle to one so it can be
/// threaded through to the codec, which is the only party that knows what a buffer actually is.
pub trait Buffer: fmt::Debug + Send + Sync {}

/// A buffer with no contents, for sessions that only exercise the user-table/sync machinery.
#[derive(Debug, Default)]
pub struct NullBuffer;

impl Buffer for NullBuffer {}
