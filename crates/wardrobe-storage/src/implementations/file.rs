//! File-based storage backend implementation for the coordinator.
//!
//! Data is stored as one binary file per key with a fixed header carrying
//! TTL information, followed by the original key (the filesystem name is
//! sanitized and lossy, so listing needs the verbatim key) and the value.
//! Writes go through a temp-file-then-rename so readers never observe a
//! torn file. The filesystem has no native compare-and-swap, so the
//! conditional operations serialize behind a mutex.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;
use wardrobe_types::{ConfigSchema, Field, FieldType, Schema, StorageKey, ValidationError};

/// Implementation name used in configuration.
pub const NAME: &str = "file";

#[allow(clippy::doc_nested_refdefs)]
/// Fixed-size file header for TTL support.
///
/// Binary layout (64 bytes total):
/// - [0-3]: Magic bytes "WARD"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-63]: Reserved/padding for future use
///
/// The header is followed by a u16 key length, the UTF-8 key, then the value.
#[derive(Debug, Clone)]
struct FileHeader {
	magic: [u8; 4],
	version: u16,
	expires_at: u64,
	padding: [u8; 50],
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"WARD";
	const VERSION: u16 = 1;
	const SIZE: usize = 64;

	/// Creates a new header with the given TTL.
	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0 // Permanent storage
		} else {
			SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.map(|d| d.as_secs())
				.unwrap_or(0)
				.saturating_add(ttl.as_secs())
		};

		Self {
			magic: *Self::MAGIC,
			version: Self::VERSION,
			expires_at,
			padding: [0; 50],
		}
	}

	/// Serializes the header to bytes.
	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(&self.magic);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes[14..64].copy_from_slice(&self.padding);
		bytes
	}

	/// Deserializes a header from bytes.
	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}

		let mut magic = [0u8; 4];
		magic.copy_from_slice(&bytes[0..4]);

		if magic != *Self::MAGIC {
			return Err(StorageError::Backend("Unrecognized file format".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);
		let expires_at = u64::from_le_bytes(expires_bytes);

		let mut padding = [0u8; 50];
		padding.copy_from_slice(&bytes[14..64]);

		Ok(Self {
			magic,
			version,
			expires_at,
			padding,
		})
	}

	/// Checks if the data has expired.
	fn is_expired(&self) -> bool {
		if self.expires_at == 0 {
			return false; // Permanent storage
		}

		let now = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_secs())
			.unwrap_or(0);

		now >= self.expires_at
	}
}

/// One decoded storage file.
struct FileEntry {
	header: FileHeader,
	key: String,
	value: Vec<u8>,
}

impl FileEntry {
	/// Encodes header + key + value into the on-disk layout.
	fn encode(key: &str, value: &[u8], ttl: Duration) -> Vec<u8> {
		let header = FileHeader::new(ttl);
		let key_bytes = key.as_bytes();
		let mut data =
			Vec::with_capacity(FileHeader::SIZE + 2 + key_bytes.len() + value.len());
		data.extend_from_slice(&header.serialize());
		data.extend_from_slice(&(key_bytes.len() as u16).to_le_bytes());
		data.extend_from_slice(key_bytes);
		data.extend_from_slice(value);
		data
	}

	/// Decodes the on-disk layout.
	fn decode(data: &[u8]) -> Result<Self, StorageError> {
		let header = FileHeader::deserialize(data)?;
		let rest = &data[FileHeader::SIZE..];
		if rest.len() < 2 {
			return Err(StorageError::Backend("File truncated before key".into()));
		}
		let key_len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
		if rest.len() < 2 + key_len {
			return Err(StorageError::Backend("File truncated inside key".into()));
		}
		let key = String::from_utf8(rest[2..2 + key_len].to_vec())
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		let value = rest[2 + key_len..].to_vec();
		Ok(Self { header, key, value })
	}
}

/// TTL configuration for different storage namespaces.
#[derive(Debug, Clone)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	/// Creates TTL config from TOML configuration.
	fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();

		if let Some(table) = config.as_table() {
			for storage_key in StorageKey::all() {
				let config_key = format!("ttl_{}", storage_key.as_str());
				if let Some(ttl_value) = table
					.get(&config_key)
					.and_then(|v| v.as_integer())
					.map(|v| v as u64)
				{
					ttls.insert(storage_key, Duration::from_secs(ttl_value));
				}
			}
		}

		Self { ttls }
	}

	/// Gets the TTL for a specific storage namespace.
	fn get_ttl(&self, storage_key: StorageKey) -> Duration {
		self.ttls
			.get(&storage_key)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
///
/// Stores each entry as a binary file under the base path, with TTL
/// expiry enforced on read and swept by `cleanup_expired`.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// TTL configuration for different storage namespaces.
	ttl_config: TtlConfig,
	/// Serializes conditional writes; plain reads and unconditional
	/// writes do not take it.
	cas_lock: Mutex<()>,
}

impl FileStorage {
	/// Creates a new FileStorage instance with the specified base path and
	/// TTL config.
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
			cas_lock: Mutex::new(()),
		}
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':'], "_");
		self.base_path.join(format!("{}.bin", safe_key))
	}

	/// Gets the TTL for a given key based on its namespace.
	fn get_ttl_for_key(&self, key: &str) -> Duration {
		let namespace = key.split(':').next().unwrap_or("");
		namespace
			.parse::<StorageKey>()
			.map(|sk| self.ttl_config.get_ttl(sk))
			.unwrap_or(Duration::ZERO)
	}

	/// Reads and decodes the entry for `key`, treating expired or absent
	/// files as `None`.
	async fn read_entry(&self, key: &str) -> Result<Option<FileEntry>, StorageError> {
		let path = self.get_file_path(key);
		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};
		let entry = FileEntry::decode(&data)?;
		if entry.header.is_expired() {
			return Ok(None);
		}
		Ok(Some(entry))
	}

	/// Writes an entry atomically via a temp file and rename.
	async fn write_entry(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Use provided TTL, or fall back to the namespace config
		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));
		let file_data = FileEntry::encode(key, &value, ttl);

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	/// Removes all expired files from storage.
	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			match fs::read(&path).await {
				Ok(data) => {
					if let Ok(header) = FileHeader::deserialize(&data) {
						if header.is_expired() {
							if let Err(e) = fs::remove_file(&path).await {
								tracing::warn!(
									"Failed to remove expired file {:?}: {}",
									path,
									e
								);
							} else {
								removed += 1;
							}
						}
					}
				}
				Err(e) => {
					tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
				}
			}
		}
		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match self.read_entry(key).await? {
			Some(entry) => Ok(entry.value),
			None => Err(StorageError::NotFound),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		self.write_entry(key, value, ttl).await
	}

	async fn create_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let _guard = self.cas_lock.lock().await;
		if self.read_entry(key).await?.is_some() {
			return Err(StorageError::AlreadyExists);
		}
		self.write_entry(key, value, ttl).await
	}

	async fn swap_bytes(
		&self,
		key: &str,
		expected: &[u8],
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let _guard = self.cas_lock.lock().await;
		match self.read_entry(key).await? {
			Some(entry) => {
				if entry.value != expected {
					return Err(StorageError::Conflict);
				}
				self.write_entry(key, value, ttl).await
			}
			None => Err(StorageError::NotFound),
		}
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.read_entry(key).await?.is_some())
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let mut keys = Vec::new();
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			let data = match fs::read(&path).await {
				Ok(data) => data,
				Err(_) => continue,
			};
			// The filesystem name is lossy; the verbatim key is in the file
			if let Ok(file_entry) = FileEntry::decode(&data) {
				if !file_entry.header.is_expired() && file_entry.key.starts_with(prefix) {
					keys.push(file_entry.key);
				}
			}
		}
		keys.sort();
		Ok(keys)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Build TTL fields dynamically based on StorageKey variants
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)];

		for storage_key in StorageKey::all() {
			let field_name = format!("ttl_{}", storage_key.as_str());
			optional_fields.push(Field::new(
				field_name,
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}

		let schema = Schema::new(vec![], optional_fields);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
/// - `ttl_<namespace>`: TTL in seconds per storage namespace (default: 0, permanent)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	let ttl_config = TtlConfig::from_config(config);

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		ttl_config,
	)))
}
