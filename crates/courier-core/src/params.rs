//! Request parameters for remote API calls.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::error::InputFileError;
use crate::value::{Object, Value};

/// Named fields plus optional file uploads for one API call.
///
/// `Null` values are never stored, so optional parameters can be passed as
/// `Option<T>` and disappear from the request when `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    fields: Object,
    files: Vec<(String, InputFile)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets a field; a `Null` value removes it instead.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        match value.into() {
            Value::Null => {
                self.fields.remove(&key);
            }
            value => {
                self.fields.insert(key, value);
            }
        }
    }

    /// Attaches a file upload under `field` (builder style).
    pub fn file(mut self, field: impl Into<String>, file: InputFile) -> Self {
        self.add_file(field, file);
        self
    }

    pub fn add_file(&mut self, field: impl Into<String>, file: InputFile) {
        self.files.push((field.into(), file));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Object {
        &self.fields
    }

    pub fn files(&self) -> &[(String, InputFile)] {
        &self.files
    }

    /// Whether the request must be sent as `multipart/form-data`.
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn into_parts(self) -> (Object, Vec<(String, InputFile)>) {
        (self.fields, self.files)
    }
}

impl From<Object> for Params {
    fn from(object: Object) -> Self {
        let mut params = Self::new();
        for (key, value) in object {
            params.insert(key, value);
        }
        params
    }
}

/// An in-memory file to upload.
///
/// Cloning is cheap; the contents are shared.
#[derive(Clone, PartialEq)]
pub struct InputFile {
    name: String,
    data: Arc<[u8]>,
}

impl InputFile {
    /// Creates a file from raw bytes. Both the name and the data must be non-empty.
    pub fn from_bytes(
        name: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Result<Self, InputFileError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InputFileError::EmptyName);
        }
        let data = data.into();
        if data.is_empty() {
            return Err(InputFileError::EmptyData);
        }
        Ok(Self {
            name,
            data: data.into(),
        })
    }

    /// Reads the whole of `reader` into memory.
    pub fn from_reader(
        name: impl Into<String>,
        mut reader: impl Read,
    ) -> Result<Self, InputFileError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InputFileError::EmptyName);
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self {
            name,
            data: data.into(),
        })
    }

    /// Reads a file from disk; the upload name is the file name component.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, InputFileError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or(InputFileError::EmptyName)?;
        let data = tokio::fs::read(path).await?;
        Ok(Self {
            name,
            data: data.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}
