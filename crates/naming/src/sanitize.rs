//! Filesystem-safe path segments from arbitrary metadata.

/// Token substituted for every character that cannot appear in a filename.
pub const DEFAULT_REPLACEMENT: &str = "-";

/// Longest filename (in bytes) accepted by common filesystems.
pub(crate) const MAX_SEGMENT_BYTES: usize = 255;

/// Characters rejected by at least one common filesystem, on top of control
/// characters.
const INVALID_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Device names Windows refuses as filenames, with or without an extension.
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9", "LPT1",
    "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turns arbitrary strings into a single, safe path segment.
///
/// Sanitization is total: every input produces an output, and the same input
/// always produces the same output. An empty input stays empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitizer {
    replacement: String,
}
impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_REPLACEMENT)
    }
}
impl Sanitizer {
    pub fn new(replacement: impl Into<String>) -> Self {
        Self { replacement: replacement.into() }
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Replaces separators, reserved characters and control characters, then
    /// tidies the edges of the result.
    ///
    /// ```
    /// use archivist_naming::Sanitizer;
    /// let sanitizer = Sanitizer::default();
    /// assert_eq!(sanitizer.sanitize("Taxes 2024/Q1: draft?"), "Taxes 2024-Q1- draft-");
    /// assert_eq!(sanitizer.sanitize(""), "");
    /// ```
    pub fn sanitize(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            if c.is_control() || INVALID_CHARS.contains(&c) {
                out.push_str(&self.replacement);
            } else {
                out.push(c);
            }
        }
        // Windows silently drops trailing dots and spaces, which would make two
        // different names refer to the same file.
        let mut out = out.trim().trim_end_matches(['.', ' ']).to_string();
        if self.is_reserved(&out) {
            out.push_str(&self.replacement);
        }
        if out.len() > MAX_SEGMENT_BYTES {
            out.truncate(out.floor_char_boundary(MAX_SEGMENT_BYTES));
        }
        out
    }

    /// Sorts the names, joins them with commas and sanitizes the whole list.
    ///
    /// Commas are kept, so the list stays readable as a single segment.
    pub fn sanitize_list<S: AsRef<str>>(&self, names: &[S]) -> String {
        let mut names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        names.sort_unstable();
        self.sanitize(&names.join(","))
    }

    fn is_reserved(&self, segment: &str) -> bool {
        let stem = segment.split('.').next().unwrap_or(segment);
        RESERVED_NAMES.iter().any(|reserved| reserved.eq_ignore_ascii_case(stem))
    }
}
