//! reading declaration files from disk
//!
//! Legacy declaration files are frequently stored in a Japanese codepage. [read_source] tries the encodings in
//! [ENCODING_CHAIN] one after another and only accepts a decoding that contains no malformed sequences.
use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use std::path::{Path, PathBuf};

/// A declaration file and the namespace its variables belong to
#[derive(derive_new::new, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    pub path: PathBuf,
    pub namespace: String,
}

impl SourceFile {
    /// Namespace derived from the name of the containing directory
    pub fn from_directory(path: PathBuf) -> Self {
        let namespace = directory_namespace(&path);
        Self { path, namespace }
    }
}

/// Name of the directory that contains `path`
pub fn directory_namespace(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    /// Shift_JIS limited to JIS X 0208
    ShiftJis,
    /// Windows-31J, Shift_JIS including the NEC and IBM extensions
    Cp932,
}

pub const ENCODING_CHAIN: [SourceEncoding; 3] = [
    SourceEncoding::Utf8,
    SourceEncoding::ShiftJis,
    SourceEncoding::Cp932,
];

impl SourceEncoding {
    fn encoding(self) -> &'static Encoding {
        match self {
            SourceEncoding::Utf8 => UTF_8,
            SourceEncoding::ShiftJis | SourceEncoding::Cp932 => SHIFT_JIS,
        }
    }

    /// Decode `bytes` strictly, `None` if any sequence is malformed
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        let bytes = match self {
            SourceEncoding::Utf8 => bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes),
            SourceEncoding::ShiftJis if uses_vendor_extensions(bytes) => return None,
            _ => bytes,
        };

        self.encoding()
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| text.into_owned())
    }
}

impl std::fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceEncoding::Utf8 => f.write_str("utf-8"),
            SourceEncoding::ShiftJis => f.write_str("shift_jis"),
            SourceEncoding::Cp932 => f.write_str("cp932"),
        }
    }
}

/// `true` if a double-byte character starts with a lead byte that only exists in the vendor tables
fn uses_vendor_extensions(bytes: &[u8]) -> bool {
    let mut iter = bytes.iter().copied();
    while let Some(byte) = iter.next() {
        match byte {
            0x87 | 0xED | 0xEE | 0xFA..=0xFC => return true,
            0x81..=0x9F | 0xE0..=0xFC => {
                // trail byte
                iter.next();
            }
            _ => {}
        }
    }
    false
}

/// Read a file and decode it with the first encoding that fits
pub fn read_source(path: &Path) -> Result<String, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    decode(&bytes).ok_or_else(|| DecodeError::Exhausted {
        path: path.to_path_buf(),
    })
}

/// Decode raw bytes following [ENCODING_CHAIN]
pub fn decode(bytes: &[u8]) -> Option<String> {
    for encoding in ENCODING_CHAIN {
        if let Some(text) = encoding.decode(bytes) {
            tracing::trace!(%encoding, "decoded");
            return Some(text);
        }
        tracing::trace!(%encoding, "not decodable");
    }
    None
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("unable to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is neither utf-8, shift_jis nor cp932", path.display())]
    Exhausted { path: PathBuf },
}
