use std::io::{Read, Seek, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::attribute;
use crate::block::{self, DataBlock};
use crate::metadata::{DIMENSIONS_KEY, DatasetAttributes};
use crate::path;
use crate::storage::{FileSystemKeyValueAccess, KeyValueAccess, LockedChannel};
use crate::url::{AttributeToken, N5Url};

/// Name of the attribute document of each group.
pub const ATTRIBUTES_JSON: &str = "attributes.json";

/// An N5 hierarchy rooted at `base_path` of a key-value store.
///
/// Group and dataset paths are relative to the container root, whether or not they start with `/`;
/// `..` cannot climb out of the container.
#[derive(Debug, Clone)]
pub struct N5Container<A = FileSystemKeyValueAccess> {
    access: A,
    base_path: String,
}

impl N5Container<FileSystemKeyValueAccess> {
    /// Open an existing container directory.
    pub fn open(base_path: impl AsRef<Path>) -> crate::Result<Self> {
        let base = base_path.as_ref().to_string_lossy().into_owned();
        let access = FileSystemKeyValueAccess::new();
        if !access.is_directory(&base) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no N5 container at {base}"),
            )
            .into());
        }
        Ok(Self::new(access, base))
    }

    /// Create a container directory, or open it if it exists.
    pub fn create(base_path: impl AsRef<Path>) -> crate::Result<Self> {
        let base = base_path.as_ref().to_string_lossy().into_owned();
        let access = FileSystemKeyValueAccess::new();
        access.create_directories(&base)?;
        Ok(Self::new(access, base))
    }
}

fn parse_document(text: &str) -> crate::Result<Value> {
    if text.trim().is_empty() {
        Ok(Value::Object(Map::new()))
    } else {
        Ok(serde_json::from_str(text)?)
    }
}

impl<A: KeyValueAccess> N5Container<A> {
    pub fn new(access: A, base_path: impl Into<String>) -> Self {
        Self {
            access,
            base_path: base_path.into(),
        }
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Backend key of a path within the container.
    pub fn key(&self, group: &str) -> String {
        let rooted = path::normalize(&format!("/{group}"));
        let relative = rooted.trim_start_matches(path::SEPARATOR);
        if relative.is_empty() {
            self.base_path.clone()
        } else {
            self.access.compose(&[self.base_path.as_str(), relative])
        }
    }

    fn attributes_key(&self, group: &str) -> String {
        self.access.compose(&[self.key(group).as_str(), ATTRIBUTES_JSON])
    }

    fn open_for_reading(&self, key: &str) -> crate::Result<Option<LockedChannel>> {
        if !self.access.is_file(key) {
            return Ok(None);
        }
        match self.access.lock_for_reading(key) {
            Ok(channel) => Ok(Some(channel)),
            // deleted between the check and the lock
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn create_group(&self, group: &str) -> crate::Result<()> {
        self.access.create_directories(&self.key(group))
    }

    pub fn exists(&self, group: &str) -> bool {
        self.access.is_directory(&self.key(group))
    }

    /// Names of the child groups and datasets of `group`.
    pub fn list(&self, group: &str) -> crate::Result<Vec<String>> {
        self.access.list(&self.key(group))
    }

    /// Delete a group or dataset with everything below it.
    pub fn remove(&self, group: &str) -> crate::Result<()> {
        self.access.delete(&self.key(group))
    }

    /// The whole attribute document of `group`, if it has one.
    pub fn attributes(&self, group: &str) -> crate::Result<Option<Value>> {
        let key = self.attributes_key(group);
        let Some(channel) = self.open_for_reading(&key)? else {
            return Ok(None);
        };
        let mut text = String::new();
        channel.new_reader().read_to_string(&mut text)?;
        log::trace!("read {} bytes of attributes from {key}", text.len());
        parse_document(&text).map(Some)
    }

    /// The attribute at `tokens` in the document of `group`.
    ///
    /// A missing document or attribute is `None`;
    /// a token that does not fit the document's structure is an error.
    pub fn get_attribute(
        &self,
        group: &str,
        tokens: &[AttributeToken],
    ) -> crate::Result<Option<Value>> {
        let Some(doc) = self.attributes(group)? else {
            return Ok(None);
        };
        Ok(attribute::find(&doc, tokens)?.cloned())
    }

    /// As [N5Container::get_attribute], deserialized into `T`.
    pub fn get_attribute_as<T: DeserializeOwned>(
        &self,
        group: &str,
        tokens: &[AttributeToken],
    ) -> crate::Result<Option<T>> {
        self.get_attribute(group, tokens)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    pub fn get_attribute_url(&self, url: &N5Url) -> crate::Result<Option<Value>> {
        self.get_attribute(url.group_path(), &url.attribute_tokens())
    }

    pub fn get_attribute_url_as<T: DeserializeOwned>(&self, url: &N5Url) -> crate::Result<Option<T>> {
        self.get_attribute_as(url.group_path(), &url.attribute_tokens())
    }

    /// Read-modify-write the attribute document of `group` under one exclusive lock.
    fn update_attributes<R>(
        &self,
        group: &str,
        f: impl FnOnce(&mut Value) -> crate::Result<R>,
    ) -> crate::Result<R> {
        let key = self.attributes_key(group);
        let mut channel = self.access.lock_for_writing(&key)?;
        let mut text = String::new();
        channel.read_to_string(&mut text)?;
        let mut doc = parse_document(&text)?;

        let out = f(&mut doc)?;

        channel.rewind()?;
        channel.set_len(0)?;
        let mut writer = channel.new_writer();
        serde_json::to_writer_pretty(&mut writer, &doc)?;
        writer.flush()?;
        writer.close()?;
        log::debug!("wrote attributes to {key}");
        Ok(out)
    }

    /// Set the attribute at `tokens`, creating the group and any intermediate nodes.
    pub fn set_attribute(
        &self,
        group: &str,
        tokens: &[AttributeToken],
        value: impl Serialize,
    ) -> crate::Result<()> {
        let value = serde_json::to_value(value)?;
        self.update_attributes(group, |doc| attribute::insert(doc, tokens, value))
    }

    pub fn set_attribute_url(&self, url: &N5Url, value: impl Serialize) -> crate::Result<()> {
        self.set_attribute(url.group_path(), &url.attribute_tokens(), value)
    }

    /// Set several top-level attributes at once.
    pub fn set_attributes(&self, group: &str, attributes: Map<String, Value>) -> crate::Result<()> {
        self.update_attributes(group, |doc| {
            for (k, v) in attributes {
                attribute::insert(doc, &[AttributeToken::Key(k)], v)?;
            }
            Ok(())
        })
    }

    /// Remove and return the attribute at `tokens`.
    pub fn remove_attribute(
        &self,
        group: &str,
        tokens: &[AttributeToken],
    ) -> crate::Result<Option<Value>> {
        if !self.access.is_file(&self.attributes_key(group)) {
            return Ok(None);
        }
        self.update_attributes(group, |doc| attribute::remove(doc, tokens))
    }

    pub fn create_dataset(&self, dataset: &str, attributes: &DatasetAttributes) -> crate::Result<()> {
        attributes.validate()?;
        self.create_group(dataset)?;
        let Value::Object(map) = serde_json::to_value(attributes)? else {
            return Err(crate::Error::general(
                "dataset attributes should serialize to a JSON object",
            ));
        };
        self.set_attributes(dataset, map)
    }

    /// Dataset metadata of `dataset`; `None` if it is not a dataset.
    pub fn dataset_attributes(&self, dataset: &str) -> crate::Result<Option<DatasetAttributes>> {
        let Some(doc) = self.attributes(dataset)? else {
            return Ok(None);
        };
        if doc.get(DIMENSIONS_KEY).is_none() {
            return Ok(None);
        }
        let attributes: DatasetAttributes = serde_json::from_value(doc)?;
        attributes.validate()?;
        Ok(Some(attributes))
    }

    pub fn dataset_exists(&self, dataset: &str) -> crate::Result<bool> {
        Ok(self.exists(dataset) && self.dataset_attributes(dataset)?.is_some())
    }

    pub fn block_key(&self, dataset: &str, grid_position: &[u64]) -> String {
        block::block_key(&self.key(dataset), grid_position)
    }

    /// Read the block at `grid_position`; `None` if it was never written.
    pub fn read_block(
        &self,
        dataset: &str,
        attributes: &DatasetAttributes,
        grid_position: &[u64],
    ) -> crate::Result<Option<DataBlock>> {
        let key = self.block_key(dataset, grid_position);
        let Some(channel) = self.open_for_reading(&key)? else {
            return Ok(None);
        };
        let mut input = channel.new_input_stream();
        block::read_block(&mut input, attributes, grid_position).map(Some)
    }

    /// Write a block, replacing any previous content.
    ///
    /// The block is encoded before the stored one is touched, so an invalid block leaves it intact.
    pub fn write_block(
        &self,
        dataset: &str,
        attributes: &DatasetAttributes,
        block: &DataBlock,
    ) -> crate::Result<()> {
        let encoded = block::encode_block(attributes, block)?;
        let key = self.block_key(dataset, block.grid_position());
        let channel = self.access.lock_for_writing(&key)?;
        channel.set_len(0)?;
        let mut output = channel.new_output_stream();
        output.write_all(&encoded)?;
        output.flush()?;
        output.close()?;
        log::debug!("wrote block {:?} to {key}", block.grid_position());
        Ok(())
    }

    /// Delete a block; returns whether it existed.
    pub fn delete_block(&self, dataset: &str, grid_position: &[u64]) -> crate::Result<bool> {
        let key = self.block_key(dataset, grid_position);
        if !self.access.exists(&key) {
            return Ok(false);
        }
        self.access.delete(&key)?;
        Ok(true)
    }

    /// Shared lock on a key relative to the container root.
    pub fn lock_for_reading(&self, key: &str) -> crate::Result<LockedChannel> {
        self.access.lock_for_reading(&self.key(key))
    }

    /// Exclusive lock on a key relative to the container root.
    pub fn lock_for_writing(&self, key: &str) -> crate::Result<LockedChannel> {
        self.access.lock_for_writing(&self.key(key))
    }
}
