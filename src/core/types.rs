/// Document number inside one segment
pub type DocId = u32;

/// Sentinel returned by enumerators once they run out of documents
pub const NO_MORE_DOCS: DocId = DocId::MAX;

/// A position of a term inside a document plus its optional payload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub position: u32,
    pub payload: Option<Vec<u8>>,
}

impl Position {
    pub fn new(position: u32) -> Self {
        Position { position, payload: None }
    }

    pub fn with_payload(position: u32, payload: Vec<u8>) -> Self {
        Position { position, payload: Some(payload) }
    }
}

/// One decoded posting: document, frequency and positions.
/// `positions` is empty for fields indexed without positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub freq: u32,
    pub positions: Vec<Position>,
}

impl Posting {
    pub fn new(doc_id: DocId, positions: Vec<Position>) -> Self {
        Posting { doc_id, freq: positions.len() as u32, positions }
    }

    pub fn freq(&self) -> u32 {
        self.freq
    }
}

/// Field of a document handed to the segment builder
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Whitespace separated tokens, indexed with positions
    Text(String),
    /// Tokens with a payload attached to every position
    TextWithPayloads(Vec<(String, Vec<u8>)>),
    /// Tokens indexed with frequencies only
    Keywords(String),
    /// Kept in the stored-fields file, not indexed
    Stored(Vec<u8>),
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub fields: Vec<(String, FieldValue)>,
}

impl Document {
    pub fn new() -> Self {
        Document { fields: Vec::new() }
    }

    pub fn add_field(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.add_field(name, value);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}
