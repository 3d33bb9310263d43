//! Parameter maps folded from decoded parts.

use std::mem;

use bytes::Bytes;
use encoding_rs::Encoding;
use futures_util::stream::{Stream, TryStreamExt};

use crate::{BoxError, FormData, PartData, Result, Storage};

/// A file part after its payload has been spilled.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    /// The field name the part was submitted under.
    pub name: String,
    /// The client-supplied filename, possibly empty.
    pub filename: String,
    /// The payload size in bytes.
    pub size: usize,
    /// The content type of the part, optional.
    pub content_type: Option<mime::Mime>,
    /// The payload handle, owned by the caller from here on.
    pub data: PartData,
}

/// The value of one parameter.
///
/// A name maps to exactly one value; a repeated name becomes a [`List`] in
/// encounter order, never a renamed key.
///
/// [`List`]: ParamValue::List
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A text field value.
    Text(String),
    /// A file part.
    File(FilePart),
    /// Values of a name that occurred more than once.
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Borrows the text value, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the file part, if this is one.
    pub fn as_file(&self) -> Option<&FilePart> {
        match self {
            Self::File(f) => Some(f),
            _ => None,
        }
    }

    /// Borrows the list items, if this is a list.
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

/// An ordered name-to-value mapping.
///
/// Names keep the insertion order of their first occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap(Vec<(String, ParamValue)>);

impl ParamMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of names in the map.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map holds no names.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks up the value of a name.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Folds one more value into the map.
    ///
    /// A fresh name is stored as-is. A repeated name grows a list: the second
    /// occurrence turns the stored value into a two-element list, later
    /// occurrences append. Text and file values follow the same rule.
    pub fn assoc(&mut self, name: &str, value: ParamValue) {
        match self.0.iter_mut().find(|(k, _)| k == name) {
            None => self.0.push((name.to_owned(), value)),
            Some((_, existing)) => {
                *existing = match mem::replace(existing, ParamValue::List(Vec::new())) {
                    ParamValue::List(mut items) => {
                        items.push(value);
                        ParamValue::List(items)
                    }
                    prior => ParamValue::List(vec![prior, value]),
                };
            }
        }
    }

    /// Sets the value of a name, replacing any existing one.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name, value)),
        }
    }

    /// Shallow-merges `other` into `self`, `other` winning on collisions.
    pub fn merge(&mut self, other: ParamMap) {
        for (name, value) in other {
            self.insert(name, value);
        }
    }

    /// Iterates names and values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for ParamMap {
    type Item = (String, ParamValue);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Drains a form into a [`ParamMap`].
///
/// Text fields are decoded with `default_encoding` unless the part declares
/// its own charset. File parts, empty ones included, are spilled through
/// `storage` chunk by chunk.
pub async fn read_params<T, B, E>(
    mut form: FormData<T>,
    storage: &Storage,
    default_encoding: &'static Encoding,
) -> Result<ParamMap>
where
    T: Stream<Item = Result<B, E>> + Unpin,
    B: Into<Bytes>,
    E: Into<BoxError>,
{
    let mut params = ParamMap::new();

    while let Some(mut field) = form.try_next().await? {
        match field.filename.clone() {
            Some(filename) => {
                let mut writer = storage.writer()?;
                while let Some(buf) = field.try_next().await? {
                    writer.write(&buf)?;
                }
                let part = FilePart {
                    name: field.name.clone(),
                    filename,
                    size: field.length,
                    content_type: field.content_type.clone(),
                    data: writer.finish()?,
                };
                params.assoc(&field.name, ParamValue::File(part));
            }
            None => {
                let text = field.text(default_encoding).await?;
                params.assoc(&field.name, ParamValue::Text(text));
            }
        }
    }

    Ok(params)
}
