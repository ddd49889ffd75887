use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Result, StoreError};

/// Value stored under one field. The store never inspects it.
pub type FieldValue = serde_json::Value;

/// Schemaless state for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateRecord {
	fields: BTreeMap<String, FieldValue>,
}

impl StateRecord {
	/// Creates an empty record.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the record with `field` set to `value`.
	pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
		self.fields.insert(field.into(), value.into());
		self
	}

	/// Returns the raw value of `field`.
	pub fn get(&self, field: &str) -> Option<&FieldValue> {
		self.fields.get(field)
	}

	/// Decodes `field` into `T`. Absent fields yield `Ok(None)`.
	pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>> {
		let Some(value) = self.fields.get(field) else {
			return Ok(None);
		};
		T::deserialize(value).map(Some).map_err(|source| StoreError::Decode {
			field: field.to_string(),
			source,
		})
	}

	pub fn contains(&self, field: &str) -> bool {
		self.fields.contains_key(field)
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Iterates fields in name order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
		self.fields.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Merges `partial` into this record and returns the touched field names.
	///
	/// Every field named by `partial` counts as touched, whether or not its
	/// value actually changed.
	pub fn merge(&mut self, partial: PartialState) -> FieldSet {
		let mut touched = FieldSet::new();
		for (field, value) in partial.fields {
			touched.insert(field.clone());
			self.fields.insert(field, value);
		}
		touched
	}
}

/// Ordered set of field values to merge into a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialState {
	fields: IndexMap<String, FieldValue>,
}

impl PartialState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the partial with `field` set to `value`.
	pub fn set(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
		self.insert(field, value);
		self
	}

	/// Returns the partial with `field` set to the serialized form of `value`.
	pub fn try_set<T: Serialize + ?Sized>(mut self, field: impl Into<String>, value: &T) -> Result<Self> {
		let field = field.into();
		let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
			field: field.clone(),
			source,
		})?;
		self.fields.insert(field, value);
		Ok(self)
	}

	/// Sets `field` to `value`, replacing an earlier value for the same field.
	pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
		self.fields.insert(field.into(), value.into());
	}

	/// Returns the names of all fields in this partial.
	pub fn field_set(&self) -> FieldSet {
		self.fields.keys().cloned().collect()
	}

	pub fn get(&self, field: &str) -> Option<&FieldValue> {
		self.fields.get(field)
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}
}

impl<K, V> FromIterator<(K, V)> for PartialState
where
	K: Into<String>,
	V: Into<FieldValue>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
		}
	}
}

/// Set of field names a subscription watches or an update touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet(BTreeSet<String>);

impl FieldSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, field: impl Into<String>) -> bool {
		self.0.insert(field.into())
	}

	pub fn contains(&self, field: &str) -> bool {
		self.0.contains(field)
	}

	/// Returns true if the two sets share at least one field.
	pub fn intersects(&self, other: &FieldSet) -> bool {
		let (small, large) = if self.0.len() <= other.0.len() { (self, other) } else { (other, self) };
		small.0.iter().any(|field| large.0.contains(field))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}
}

impl<S: Into<String>> FromIterator<S> for FieldSet {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Self(iter.into_iter().map(Into::into).collect())
	}
}

impl From<&[&str]> for FieldSet {
	fn from(fields: &[&str]) -> Self {
		fields.iter().copied().collect()
	}
}

impl<const N: usize> From<[&str; N]> for FieldSet {
	fn from(fields: [&str; N]) -> Self {
		fields.into_iter().collect()
	}
}
