//! Storage contract.
//!
//! djpcms never talks to a database directly. Models implement [`Record`]
//! and are persisted through a [`Manager`], which only has to provide
//! equality filtering, single-record lookup, save and delete.
//! [`MemoryManager`] is the in-process implementation used by tests and by
//! applications that keep their content in memory.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::exception::{Error, Result};

/// A field value as seen by filters and unique constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
	/// SQL-style null.
	Null,
	/// Boolean.
	Bool(bool),
	/// Integer.
	Int(i64),
	/// Text.
	Str(String),
}

impl fmt::Display for FieldValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => f.write_str("null"),
			Self::Bool(b) => write!(f, "{b}"),
			Self::Int(i) => write!(f, "{i}"),
			Self::Str(s) => f.write_str(s),
		}
	}
}

impl From<i64> for FieldValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<u64> for FieldValue {
	fn from(value: u64) -> Self {
		Self::Int(value as i64)
	}
}

impl From<u32> for FieldValue {
	fn from(value: u32) -> Self {
		Self::Int(i64::from(value))
	}
}

impl From<usize> for FieldValue {
	fn from(value: usize) -> Self {
		Self::Int(value as i64)
	}
}

impl From<bool> for FieldValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<&str> for FieldValue {
	fn from(value: &str) -> Self {
		Self::Str(value.to_string())
	}
}

impl From<String> for FieldValue {
	fn from(value: String) -> Self {
		Self::Str(value)
	}
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

/// Conjunction of field equality conditions.
///
/// # Examples
///
/// ```
/// use djpcms_core::storage::Filter;
///
/// let filter = Filter::new().eq("page", 1u64).eq("block", 0u32);
/// assert_eq!(filter.conditions().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
	conditions: Vec<(String, FieldValue)>,
}

impl Filter {
	/// An empty filter, matching every record.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `field == value`.
	pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
		self.conditions.push((field.into(), value.into()));
		self
	}

	/// The conditions in insertion order.
	pub fn conditions(&self) -> &[(String, FieldValue)] {
		&self.conditions
	}

	/// Whether `record` satisfies every condition.
	pub fn matches<T: Record>(&self, record: &T) -> bool {
		self.conditions
			.iter()
			.all(|(field, value)| record.field(field) == *value)
	}
}

/// A persistable model.
pub trait Record: Clone + Send + Sync + 'static {
	/// Model label, e.g. `cms.page`.
	const MODEL: &'static str;

	/// Primary key, `None` until first saved.
	fn pk(&self) -> Option<u64>;

	/// Assigns the primary key. Called by managers on first save.
	fn set_pk(&mut self, pk: u64);

	/// Value of a named field. Unknown fields read as [`FieldValue::Null`].
	fn field(&self, name: &str) -> FieldValue;
}

/// Persistence operations for one model.
pub trait Manager<T: Record>: Send + Sync {
	/// Records matching `filter`, in primary key order.
	fn filter(&self, filter: &Filter) -> Result<Vec<T>>;

	/// Inserts or updates `record`, assigning a primary key on insert.
	fn save(&self, record: &mut T) -> Result<()>;

	/// Deletes `record`. Fails with `DoesNotExist` if it is not stored.
	fn delete(&self, record: &T) -> Result<()>;

	/// The single record matching `filter`.
	fn get(&self, filter: &Filter) -> Result<T> {
		let mut found = self.filter(filter)?;
		match found.len() {
			0 => Err(Error::DoesNotExist { model: T::MODEL }),
			1 => Ok(found.remove(0)),
			_ => Err(Error::MultipleObjectsReturned { model: T::MODEL }),
		}
	}

	/// Record by primary key.
	fn get_by_pk(&self, pk: u64) -> Result<T> {
		self.filter(&Filter::new())?
			.into_iter()
			.find(|r| r.pk() == Some(pk))
			.ok_or(Error::DoesNotExist { model: T::MODEL })
	}

	/// Every stored record.
	fn all(&self) -> Result<Vec<T>> {
		self.filter(&Filter::new())
	}
}

/// In-memory [`Manager`] with optional unique-together constraints.
pub struct MemoryManager<T: Record> {
	rows: RwLock<BTreeMap<u64, T>>,
	next_id: AtomicU64,
	unique_together: Vec<Vec<&'static str>>,
}

impl<T: Record> Default for MemoryManager<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Record> MemoryManager<T> {
	/// An empty manager without constraints.
	pub fn new() -> Self {
		Self {
			rows: RwLock::new(BTreeMap::new()),
			next_id: AtomicU64::new(1),
			unique_together: Vec::new(),
		}
	}

	/// Adds a unique-together constraint over `fields`.
	///
	/// # Examples
	///
	/// ```ignore
	/// let blocks = MemoryManager::<BlockContent>::new().with_unique(&["page", "block", "position"]);
	/// ```
	pub fn with_unique(mut self, fields: &[&'static str]) -> Self {
		self.unique_together.push(fields.to_vec());
		self
	}

	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.rows.read().len()
	}

	/// Whether nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.rows.read().is_empty()
	}

	fn check_unique(&self, rows: &BTreeMap<u64, T>, record: &T, pk: u64) -> Result<()> {
		for fields in &self.unique_together {
			let key: Vec<FieldValue> = fields.iter().map(|f| record.field(f)).collect();
			let clash = rows.iter().any(|(other_pk, other)| {
				*other_pk != pk && fields.iter().map(|f| other.field(f)).eq(key.iter().cloned())
			});
			if clash {
				let values: Vec<String> = key.iter().map(ToString::to_string).collect();
				return Err(Error::Integrity(format!(
					"duplicate {} ({}) = ({})",
					T::MODEL,
					fields.join(", "),
					values.join(", ")
				)));
			}
		}
		Ok(())
	}
}

impl<T: Record> Manager<T> for MemoryManager<T> {
	fn filter(&self, filter: &Filter) -> Result<Vec<T>> {
		Ok(self
			.rows
			.read()
			.values()
			.filter(|r| filter.matches(*r))
			.cloned()
			.collect())
	}

	fn save(&self, record: &mut T) -> Result<()> {
		let mut rows = self.rows.write();
		let pk = match record.pk() {
			Some(pk) => pk,
			None => self.next_id.fetch_add(1, Ordering::Relaxed),
		};
		self.check_unique(&rows, record, pk)?;
		record.set_pk(pk);
		rows.insert(pk, record.clone());
		Ok(())
	}

	fn delete(&self, record: &T) -> Result<()> {
		let pk = record.pk().ok_or(Error::DoesNotExist { model: T::MODEL })?;
		self.rows
			.write()
			.remove(&pk)
			.map(|_| ())
			.ok_or(Error::DoesNotExist { model: T::MODEL })
	}

	fn get_by_pk(&self, pk: u64) -> Result<T> {
		self.rows
			.read()
			.get(&pk)
			.cloned()
			.ok_or(Error::DoesNotExist { model: T::MODEL })
	}
}
