/// Data model shared across Macrofetch crates.
use std::fmt;

/// A named image resource exposed by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Macro {
    /// Unique key, used to compose the output filename.
    pub name: String,
    /// Opaque handle the source needs to fetch the image (file PHID or URI).
    pub remote_id: String,
}

impl Macro {
    pub fn new(name: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_id: remote_id.into(),
        }
    }
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.remote_id)
    }
}

/// A macro together with its raw image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroImage {
    pub entry: Macro,
    pub body: Vec<u8>,
}

impl MacroImage {
    pub fn new(entry: Macro, body: impl Into<Vec<u8>>) -> Self {
        Self {
            entry,
            body: body.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }
}
