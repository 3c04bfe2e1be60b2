//! Read-only access to the messages a query is evaluated against.
//!
//! Evaluation only ever needs a message's raw content, its parsed document
//! and its metadata, so the engine depends on the [`MessageBatch`] trait
//! rather than on any particular storage. [`Batch`] is a simple owned
//! implementation used by the CLI and tests. It parses each message at most
//! once, through a [`DocumentCache`].

use std::{borrow::Cow, sync::OnceLock};

use indexmap::IndexMap;

use crate::{convert::parse_json, evaluator::EvalError, value::Value};

/// Narrow accessor interface over a batch of messages.
pub trait MessageBatch: Send + Sync {
    /// Number of messages in the batch
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw content of the message at `index`
    fn content(&self, index: usize) -> Option<&[u8]>;

    /// Content of the message at `index` parsed as JSON. The default parses
    /// on every call; implementations that can hold state should cache.
    fn document(&self, index: usize) -> Result<Cow<'_, Value>, EvalError> {
        parse_document(self, index).map(Cow::Owned)
    }

    /// A single metadata value of the message at `index`
    fn metadata(&self, index: usize, key: &str) -> Option<&str>;

    /// All metadata of the message at `index`, in insertion order
    fn metadata_pairs(&self, index: usize) -> Vec<(&str, &str)>;
}

/// A message: content bytes plus string metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub content: Vec<u8>,
    pub metadata: IndexMap<String, String>,
}

impl Message {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Message {
            content: content.into(),
            metadata: IndexMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Parse the content of message `index` of `batch`.
pub fn parse_document<B: MessageBatch + ?Sized>(batch: &B, index: usize) -> Result<Value, EvalError> {
    let content = batch.content(index).ok_or(EvalError::IndexOutOfBounds {
        index,
        len: batch.len(),
    })?;
    parse_json(content).map_err(|e| EvalError::Json(e.to_string()))
}

/// Parsed documents of a batch, one slot per message, each filled on first
/// use. Failures are cached too, so invalid content is only parsed once.
#[derive(Debug, Clone, Default)]
pub struct DocumentCache {
    slots: Vec<OnceLock<Result<Value, EvalError>>>,
}

impl DocumentCache {
    pub fn new(len: usize) -> Self {
        DocumentCache {
            slots: (0..len).map(|_| OnceLock::new()).collect(),
        }
    }

    /// The document of message `index`, parsing it from `batch` if this is
    /// the first request for it.
    pub fn document<B: MessageBatch + ?Sized>(
        &self,
        batch: &B,
        index: usize,
    ) -> Result<&Value, EvalError> {
        let slot = self.slots.get(index).ok_or(EvalError::IndexOutOfBounds {
            index,
            len: batch.len(),
        })?;
        slot.get_or_init(|| parse_document(batch, index))
            .as_ref()
            .map_err(Clone::clone)
    }
}

/// An owned, ordered batch of messages.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    messages: Vec<Message>,
    documents: DocumentCache,
}

impl Batch {
    pub fn new(messages: Vec<Message>) -> Self {
        let documents = DocumentCache::new(messages.len());
        Batch {
            messages,
            documents,
        }
    }

    /// Convenience for a batch of one message
    pub fn single(message: Message) -> Self {
        Batch::new(vec![message])
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.messages == other.messages
    }
}

impl MessageBatch for Batch {
    fn len(&self) -> usize {
        self.messages.len()
    }

    fn content(&self, index: usize) -> Option<&[u8]> {
        self.messages.get(index).map(|m| m.content.as_slice())
    }

    fn document(&self, index: usize) -> Result<Cow<'_, Value>, EvalError> {
        self.documents.document(self, index).map(Cow::Borrowed)
    }

    fn metadata(&self, index: usize, key: &str) -> Option<&str> {
        self.messages
            .get(index)
            .and_then(|m| m.metadata.get(key))
            .map(String::as_str)
    }

    fn metadata_pairs(&self, index: usize) -> Vec<(&str, &str)> {
        self.messages
            .get(index)
            .map(|m| {
                m.metadata
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
