use std::fmt::Write as _;

use bytes::Bytes;

/// Caller-chosen session identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token(pub Bytes);

impl Token {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// File-name-safe model id: the token itself when it is plain ASCII
    /// (`[A-Za-z0-9_-]+`), otherwise `x.` followed by its lowercase hex form.
    /// The `.` never occurs in a plain id, so distinct tokens never share files.
    pub fn model_id(&self) -> String {
        let plain = !self.0.is_empty()
            && self
                .0
                .iter()
                .all(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_');
        if plain {
            return self.0.iter().map(|b| *b as char).collect();
        }

        let mut hex = String::with_capacity(2 + self.0.len() * 2);
        hex.push_str("x.");
        for b in self.0.iter() {
            let _ = write!(hex, "{b:02x}");
        }
        hex
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.model_id())
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}
