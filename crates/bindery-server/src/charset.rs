//! Request character-set resolution and decoding.

use bindery_protocol::HttpMethod;
use tracing::debug;

/// Character sets understood when decoding request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// Platform default.
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Charset {
    /// Look up a charset label, case-insensitively.
    pub fn for_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "us-ascii" | "ascii" => Some(Self::Ascii),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Some(Self::Latin1),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Ascii => "US-ASCII",
            Self::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode `bytes`, replacing anything the charset cannot represent.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
                .collect(),
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Pick the charset for a request body.
///
/// GET is always read as UTF-8. POST uses the forced override when one is
/// configured, else the declared encoding. Unknown or missing labels fall
/// back to the platform default.
pub fn resolve(method: &HttpMethod, declared: Option<&str>, forced: Option<&str>) -> Charset {
    if *method == HttpMethod::Get {
        return Charset::Utf8;
    }
    let Some(label) = forced.or(declared) else {
        return Charset::default();
    };
    Charset::for_label(label).unwrap_or_else(|| {
        debug!("Unknown character encoding {label:?}, using platform default");
        Charset::default()
    })
}
