//! Configuration validation for backend implementation tables.
//!
//! Backend implementations (storage today) receive their configuration as a
//! raw `toml::Value` sub-table. Each implementation exposes a schema object
//! describing the fields it understands so the table can be checked before
//! the backend is constructed.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// A required field is missing from the table.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A field holds a value outside its allowed range.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A field holds a value of the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Expected type of a configuration field.
#[derive(Debug, Clone)]
pub enum FieldType {
	/// A string value.
	String,
	/// An integer value with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	/// A boolean value.
	Boolean,
}

/// One field in a configuration schema.
#[derive(Debug, Clone)]
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
}

impl Field {
	/// Creates a new field with the given name and type.
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
		}
	}
}

/// A validation schema: required fields plus optional fields.
#[derive(Debug, Clone)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	/// Creates a new schema with required and optional fields.
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Checks that the value is a table, that all required fields are
	/// present, and that every known field has the declared type.
	///
	/// # Errors
	///
	/// Returns a [`ValidationError`] describing the first violation found.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			check_field_type(&field.name, value, &field.field_type)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				check_field_type(&field.name, value, &field.field_type)?;
			}
		}

		Ok(())
	}
}

fn check_field_type(
	name: &str,
	value: &toml::Value,
	expected: &FieldType,
) -> Result<(), ValidationError> {
	match expected {
		FieldType::String => {
			if !value.is_str() {
				return Err(type_mismatch(name, "string", value));
			}
		}
		FieldType::Integer { min, max } => {
			let n = value
				.as_integer()
				.ok_or_else(|| type_mismatch(name, "integer", value))?;
			if let Some(min) = min {
				if n < *min {
					return Err(ValidationError::InvalidValue {
						field: name.to_string(),
						message: format!("{} is below minimum {}", n, min),
					});
				}
			}
			if let Some(max) = max {
				if n > *max {
					return Err(ValidationError::InvalidValue {
						field: name.to_string(),
						message: format!("{} is above maximum {}", n, max),
					});
				}
			}
		}
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(type_mismatch(name, "boolean", value));
			}
		}
	}
	Ok(())
}

fn type_mismatch(name: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

/// Trait implemented by each backend's configuration schema object.
pub trait ConfigSchema: Send + Sync {
	/// Validates the raw TOML table for this backend.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(s: &str) -> toml::Value {
		toml::from_str::<toml::Value>(s).unwrap()
	}

	#[test]
	fn missing_required_field_is_rejected() {
		let schema = Schema::new(vec![Field::new("path", FieldType::String)], vec![]);
		let err = schema.validate(&parse("other = 1")).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(f) if f == "path"));
	}

	#[test]
	fn integer_bounds_are_enforced() {
		let schema = Schema::new(
			vec![Field::new(
				"ttl",
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			)],
			vec![],
		);
		assert!(schema.validate(&parse("ttl = 60")).is_ok());
		assert!(schema.validate(&parse("ttl = -1")).is_err());
	}

	#[test]
	fn unknown_fields_are_ignored() {
		let schema = Schema::new(vec![], vec![Field::new("path", FieldType::String)]);
		assert!(schema.validate(&parse("something_else = true")).is_ok());
	}

	#[test]
	fn wrong_type_is_rejected() {
		let schema = Schema::new(vec![], vec![Field::new("path", FieldType::String)]);
		let err = schema.validate(&parse("path = 5")).unwrap_err();
		assert!(matches!(err, ValidationError::TypeMismatch { .. }));
	}
}
