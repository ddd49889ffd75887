/// A convenient type alias for `Result` with `E` = [`StoreError`].
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors from typed access to schemaless record fields.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	/// A value could not be converted into a field value.
	#[error("cannot encode field `{field}`: {source}")]
	Encode {
		field: String,
		#[source]
		source: serde_json::Error,
	},
	/// A stored field value does not have the requested shape.
	#[error("cannot decode field `{field}`: {source}")]
	Decode {
		field: String,
		#[source]
		source: serde_json::Error,
	},
}
