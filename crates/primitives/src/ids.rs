use std::borrow::Borrow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

/// Opaque identifier scoping one state record, typically a repository path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey(Arc<str>);

impl EntityKey {
	pub fn new(key: impl AsRef<str>) -> Self {
		Self(Arc::from(key.as_ref()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for EntityKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for EntityKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for EntityKey {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl From<&str> for EntityKey {
	fn from(key: &str) -> Self {
		Self::new(key)
	}
}

impl From<String> for EntityKey {
	fn from(key: String) -> Self {
		Self(Arc::from(key))
	}
}

impl From<&Path> for EntityKey {
	fn from(path: &Path) -> Self {
		Self::new(path.to_string_lossy())
	}
}

/// Opaque token identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
	/// Allocates a fresh random identifier.
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for SubscriptionId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for SubscriptionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.simple())
	}
}

/// Identifier of one live dashboard session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session#{}", self.0)
	}
}
