//! Filename templating for stored documents.
//!
//! Renders a process-wide filename format against a [`Document`]'s metadata.
//! The format uses `{placeholder}` fields, `{tags[key]}` lookups, and `{{`/`}}`
//! for literal braces. Every value is sanitized before substitution; literal
//! `/` in the format itself is kept, so a format can describe directories.
//!
//! # Placeholders
//!
//! | Placeholder                                   | Value                                          |
//! |-----------------------------------------------|------------------------------------------------|
//! | `title`                                       | Document title                                 |
//! | `correspondent`                               | Correspondent name, or `none`                  |
//! | `document_type`                               | Document type name, or `none`                  |
//! | `created`                                     | `YYYY-MM-DD`, or `none`                        |
//! | `created_year`, `created_month`, `created_day` | Zero-padded parts, each `none` when unknown  |
//! | `added`                                       | `YYYY-MM-DD`                                   |
//! | `added_year`, `added_month`, `added_day`      | Zero-padded parts                              |
//! | `tag_list`, `tags`                            | Sorted, comma-joined tag names                 |
//! | `tags[N]`                                     | Slug of the N-th tag (sorted by name)          |
//! | `tags[key]`                                   | Tag named `key`, or the value half of a tag named `key_value`/`key-value`; empty when absent |
//!
//! # Example
//!
//! ```
//! use archivist_document::{Document, Role};
//! use archivist_naming::{FilenameGenerator, Sanitizer};
//! use time::{Date, Month};
//!
//! let mut doc = Document::new(42, "application/pdf", ".pdf", Date::from_calendar_date(2024, Month::May, 2).unwrap());
//! doc.title = "Power bill".to_string();
//! doc.correspondent = Some("City/Utilities".to_string());
//!
//! let generator = FilenameGenerator::new(Some("{correspondent}/{added_year}/{title}".into()), Sanitizer::default());
//! assert_eq!(generator.render(&doc), "City-Utilities/2024/Power bill");
//! assert_eq!(generator.filename(&doc, 1, Role::Archive), "City-Utilities/2024/Power bill_01.pdf");
//! ```

use crate::error::{Error, ErrorKind, Result};
use crate::path::normalize as normalize_path;
use crate::sanitize::{MAX_SEGMENT_BYTES, Sanitizer};
use archivist_document::{Document, GPG_EXTENSION, Role};
use slug::slugify;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use time::Date;
use tracing::instrument;

const NONE: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Correspondent,
    DocumentType,
    Created,
    CreatedYear,
    CreatedMonth,
    CreatedDay,
    Added,
    AddedYear,
    AddedMonth,
    AddedDay,
    Tags,
    TagList,
}
impl FromStr for Field {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "title" => Self::Title,
            "correspondent" => Self::Correspondent,
            "document_type" => Self::DocumentType,
            "created" => Self::Created,
            "created_year" => Self::CreatedYear,
            "created_month" => Self::CreatedMonth,
            "created_day" => Self::CreatedDay,
            "added" => Self::Added,
            "added_year" => Self::AddedYear,
            "added_month" => Self::AddedMonth,
            "added_day" => Self::AddedDay,
            "tags" => Self::Tags,
            "tag_list" => Self::TagList,
            "" => exn::bail!(ErrorKind::Template("positional placeholders are not supported".to_string())),
            other => exn::bail!(ErrorKind::Template(format!("unknown placeholder `{other}`"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagKey {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
    Tag(TagKey),
}
impl Segment {
    /// Parses the text between a pair of braces.
    fn placeholder(s: &str) -> Result<Self> {
        let Some((name, rest)) = s.split_once('[') else {
            if s.contains([':', '!', '.']) {
                exn::bail!(ErrorKind::Template(format!("format specifiers are not supported in `{{{s}}}`")));
            }
            return Ok(Self::Field(s.parse()?));
        };
        let Some(key) = rest.strip_suffix(']') else {
            exn::bail!(ErrorKind::Template(format!("malformed lookup `{{{s}}}`")));
        };
        if name.parse::<Field>()? != Field::Tags {
            exn::bail!(ErrorKind::Template(format!("`{name}` cannot be indexed")));
        }
        if key.is_empty() || key.contains(['[', ']']) {
            exn::bail!(ErrorKind::Template(format!("malformed lookup `{{{s}}}`")));
        }
        Ok(Self::Tag(match key.parse::<usize>() {
            Ok(index) => TagKey::Index(index),
            Err(_) => TagKey::Name(slugify(key)),
        }))
    }
}

/// A parsed filename format.
///
/// Parsing happens once, up front, so that an invalid format is detected
/// before any document is named with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    segments: Vec<Segment>,
}
impl FromStr for FilenameTemplate {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.next_if_eq(&'{').is_some() => literal.push('{'),
                '}' if chars.next_if_eq(&'}').is_some() => literal.push('}'),
                '}' => exn::bail!(ErrorKind::Template("single `}` encountered".to_string())),
                '{' => {
                    let mut placeholder = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => exn::bail!(ErrorKind::Template("nested `{` in placeholder".to_string())),
                            Some(c) => placeholder.push(c),
                            None => exn::bail!(ErrorKind::Template("unclosed `{`".to_string())),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::placeholder(placeholder.trim())?);
                },
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }
}
impl FilenameTemplate {
    /// Substitutes every placeholder with the document's sanitized metadata.
    ///
    /// The result is not trimmed or validated; see [`FilenameGenerator::render`].
    pub fn render(&self, doc: &Document, sanitizer: &Sanitizer) -> String {
        let tags = TagLookup::new(&doc.tags, sanitizer);
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Field(field) => out.push_str(&Self::field(*field, doc, sanitizer, &tags)),
                Segment::Tag(key) => out.push_str(tags.get(key)),
            }
        }
        out
    }

    fn field(field: Field, doc: &Document, sanitizer: &Sanitizer, tags: &TagLookup) -> String {
        let optional = |value: &Option<String>| value.as_deref().map_or(NONE.to_string(), |v| sanitizer.sanitize(v));
        let part = |date: Option<Date>, f: fn(Date) -> String| date.map_or(NONE.to_string(), f);
        match field {
            Field::Title => sanitizer.sanitize(&doc.title),
            Field::Correspondent => optional(&doc.correspondent),
            Field::DocumentType => optional(&doc.document_type),
            Field::Created => part(doc.created, iso_date),
            Field::CreatedYear => part(doc.created, year),
            Field::CreatedMonth => part(doc.created, month),
            Field::CreatedDay => part(doc.created, day),
            Field::Added => iso_date(doc.added),
            Field::AddedYear => year(doc.added),
            Field::AddedMonth => month(doc.added),
            Field::AddedDay => day(doc.added),
            Field::Tags | Field::TagList => tags.list.clone(),
        }
    }
}

fn iso_date(date: Date) -> String {
    format!("{}-{}-{}", year(date), month(date), day(date))
}

fn year(date: Date) -> String {
    format!("{:04}", date.year())
}

fn month(date: Date) -> String {
    format!("{:02}", u8::from(date.month()))
}

fn day(date: Date) -> String {
    format!("{:02}", date.day())
}

/// Tag values exposed to `{tags[...]}` lookups.
struct TagLookup {
    list: String,
    by_index: Vec<String>,
    by_key: HashMap<String, String>,
}
impl TagLookup {
    fn new(tags: &[String], sanitizer: &Sanitizer) -> Self {
        let mut names: Vec<&str> = tags.iter().map(String::as_str).collect();
        names.sort_unstable();
        let mut by_key = HashMap::new();
        for name in &names {
            by_key.insert(slugify(name), sanitizer.sanitize(name));
        }
        // Tags like `type_invoice` or `year-2024` double as key/value pairs, but
        // never shadow a tag that is literally called `type`.
        for name in &names {
            if let Some((key, value)) = name.split_once('_').or_else(|| name.split_once('-')) {
                by_key.entry(slugify(key)).or_insert_with(|| slugify(value));
            }
        }
        Self {
            list: sanitizer.sanitize_list(names.as_slice()),
            by_index: names.iter().map(|name| slugify(name)).collect(),
            by_key,
        }
    }

    fn get(&self, key: &TagKey) -> &str {
        let value = match key {
            TagKey::Index(index) => self.by_index.get(*index),
            TagKey::Name(name) => self.by_key.get(name),
        };
        value.map_or("", String::as_str)
    }
}

/// Derives candidate paths and full filenames for documents from an optional,
/// possibly invalid, filename format.
///
/// A missing format disables templating. An invalid format is reported once
/// (the first time it would have been used) and then behaves like a missing
/// one. Either way, names fall back to the document's padded identifier.
pub struct FilenameGenerator {
    format: Option<String>,
    template: Option<Result<FilenameTemplate>>,
    sanitizer: Sanitizer,
    warned: AtomicBool,
}
impl Default for FilenameGenerator {
    fn default() -> Self {
        Self::new(None, Sanitizer::default())
    }
}
impl FilenameGenerator {
    pub fn new(format: Option<String>, sanitizer: Sanitizer) -> Self {
        let template = format.as_deref().map(str::parse);
        Self { format, template, sanitizer, warned: AtomicBool::new(false) }
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Renders the candidate path for `doc`, without counter or extension.
    ///
    /// Returns an empty string when no format is configured or the format
    /// cannot be used, never an error. The result never starts or ends with
    /// `/` and never leaves the directory it is resolved against.
    #[instrument(skip_all, fields(document_id = doc.id))]
    pub fn render(&self, doc: &Document) -> String {
        let template = match &self.template {
            None => return String::new(),
            Some(Ok(template)) => template,
            Some(Err(e)) => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        format = self.format.as_deref().unwrap_or_default(),
                        error = %e,
                        "Invalid filename format, falling back to default"
                    );
                }
                return String::new();
            },
        };
        let rendered = template.render(doc, &self.sanitizer);
        let trimmed = rendered.trim().trim_matches('/');
        if trimmed.is_empty() {
            return String::new();
        }
        match normalize_path(trimmed) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(path = trimmed, error = %e, "Filename format produced an unusable path, falling back to default");
                String::new()
            },
        }
    }

    /// Full filename for `doc` with the given disambiguating counter.
    pub fn filename(&self, doc: &Document, counter: u32, role: Role) -> String {
        self.filename_from(&self.render(doc), doc, counter, role)
    }

    /// Full filename built from an already rendered candidate path.
    ///
    /// ```text
    /// ("", counter 0, Archive)             → "0000042.pdf"
    /// ("bills/power", counter 2, Original) → "bills/power_02.jpg"
    /// (gpg storage, counter 0, Original)   → "0000042.jpg.gpg"
    /// ```
    pub fn filename_from(&self, candidate: &str, doc: &Document, counter: u32, role: Role) -> String {
        let mut suffix = match counter {
            0 => String::new(),
            _ => format!("_{counter:02}"),
        };
        suffix.push_str(match role {
            Role::Archive => ".pdf",
            Role::Original => doc.file_type.as_str(),
        });
        if doc.storage_type.is_encrypted() {
            suffix.push_str(GPG_EXTENSION);
        }
        let mut name = match candidate.is_empty() {
            true => doc.padded_id(),
            false => candidate.to_string(),
        };
        // The last segment is the actual filename; it has to fit with the suffix.
        let stem_start = name.rfind('/').map_or(0, |slash| slash + 1);
        let room = MAX_SEGMENT_BYTES.saturating_sub(suffix.len());
        if name.len() - stem_start > room {
            name.truncate(stem_start + name[stem_start..].floor_char_boundary(room));
            let kept = name[stem_start..].trim_end_matches(['.', ' ']).len();
            name.truncate(stem_start + kept);
        }
        name.push_str(&suffix);
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_document::StorageType;
    use rstest::rstest;
    use time::Month;

    fn make_test_document() -> Document {
        let added = Date::from_calendar_date(2024, Month::June, 15).unwrap();
        let mut doc = Document::new(42, "image/jpeg", ".jpg", added);
        doc.title = "Power bill".to_string();
        doc.created = Some(Date::from_calendar_date(2023, Month::January, 5).unwrap());
        doc.correspondent = Some("City Utilities".to_string());
        doc.document_type = Some("Invoice".to_string());
        doc.tags = vec!["tax".to_string(), "Bank Statements".to_string(), "year_2023".to_string()];
        doc
    }

    fn generator(format: &str) -> FilenameGenerator {
        FilenameGenerator::new(Some(format.to_string()), Sanitizer::default())
    }

    #[rstest]
    #[case("{title}", "Power bill")]
    #[case("{correspondent}/{title}", "City Utilities/Power bill")]
    #[case("{document_type}", "Invoice")]
    #[case("{created}", "2023-01-05")]
    #[case("{created_year}/{created_month}/{created_day}", "2023/01/05")]
    #[case("{added}", "2024-06-15")]
    #[case("{added_year}-{added_month}-{added_day}", "2024-06-15")]
    #[case("{tag_list}", "Bank Statements,tax,year_2023")]
    #[case("{tags}", "Bank Statements,tax,year_2023")]
    #[case("{tags[0]}", "bank-statements")]
    #[case("{tags[2]}", "year-2023")]
    #[case("{tags[tax]}", "tax")]
    #[case("{tags[year]}", "2023")]
    #[case("{tags[Bank Statements]}", "Bank Statements")]
    #[case("{tags[missing]}/{title}", "Power bill")]
    #[case("{tags[9]}x", "x")]
    #[case("{{literal}} {title}", "{literal} Power bill")]
    #[case("/{title}/", "Power bill")]
    #[case("  {title}  ", "Power bill")]
    #[case("{ title }", "Power bill")]
    fn test_render(#[case] format: &str, #[case] expected: &str) {
        assert_eq!(generator(format).render(&make_test_document()), expected);
    }

    #[test]
    fn test_absent_values_render_none() {
        let mut doc = make_test_document();
        doc.correspondent = None;
        doc.document_type = None;
        doc.created = None;
        let generator = generator("{correspondent}/{document_type}/{created}/{created_year}-{created_month}-{created_day}");
        assert_eq!(generator.render(&doc), "none/none/none/none-none-none");
    }

    #[test]
    fn test_tag_slugs_fold_to_ascii() {
        let mut doc = make_test_document();
        doc.tags = vec!["Büro Ärger".to_string(), "Ort_Köln".to_string()];
        assert_eq!(generator("{tags[0]}").render(&doc), "buro-arger");
        assert_eq!(generator("{tags[ort]}").render(&doc), "koln");
        assert_eq!(generator("{tags[büro ärger]}").render(&doc), "Büro Ärger");
    }

    #[test]
    fn test_values_are_sanitized_but_format_separators_kept() {
        let mut doc = make_test_document();
        doc.title = "2024/Q1: taxes?".to_string();
        doc.correspondent = Some("A/B".to_string());
        assert_eq!(generator("{correspondent}/{title}").render(&doc), "A-B/2024-Q1- taxes-");
    }

    #[rstest]
    #[case("{unknown}")]
    #[case("{}")]
    #[case("{title")]
    #[case("title}")]
    #[case("{title:>10}")]
    #[case("{title!r}")]
    #[case("{title.upper}")]
    #[case("{title[0]}")]
    #[case("{tags[]}")]
    #[case("{tags[a]b}")]
    #[case("{ti{tle}")]
    fn test_invalid_format_falls_back(#[case] format: &str) {
        assert!(format.parse::<FilenameTemplate>().is_err());
        let generator = generator(format);
        let doc = make_test_document();
        assert_eq!(generator.render(&doc), "");
        // Still falls back (and doesn't panic) on subsequent renders.
        assert_eq!(generator.render(&doc), "");
        assert_eq!(generator.filename(&doc, 0, Role::Archive), "0000042.pdf");
    }

    #[test]
    fn test_traversal_falls_back() {
        let doc = make_test_document();
        assert_eq!(generator("../../{title}").render(&doc), "");
        assert_eq!(generator("a/../{title}").render(&doc), "Power bill");
    }

    #[test]
    fn test_no_format_renders_empty() {
        let doc = make_test_document();
        let generator = FilenameGenerator::default();
        assert_eq!(generator.render(&doc), "");
        assert_eq!(generator.filename(&doc, 0, Role::Original), "0000042.jpg");
    }

    #[test]
    fn test_whitespace_only_result_renders_empty() {
        let mut doc = make_test_document();
        doc.title = String::new();
        assert_eq!(generator("{title}").render(&doc), "");
        assert_eq!(generator(" / ").render(&doc), "");
    }

    #[rstest]
    #[case("", 0, Role::Archive, StorageType::Unencrypted, "0000042.pdf")]
    #[case("", 0, Role::Original, StorageType::Unencrypted, "0000042.jpg")]
    #[case("", 3, Role::Original, StorageType::Unencrypted, "0000042_03.jpg")]
    #[case("bills/power", 1, Role::Archive, StorageType::Unencrypted, "bills/power_01.pdf")]
    #[case("bills/power", 12, Role::Original, StorageType::Unencrypted, "bills/power_12.jpg")]
    #[case("bills/power", 123, Role::Original, StorageType::Unencrypted, "bills/power_123.jpg")]
    #[case("", 0, Role::Original, StorageType::Gpg, "0000042.jpg.gpg")]
    #[case("bills/power", 2, Role::Archive, StorageType::Gpg, "bills/power_02.pdf.gpg")]
    fn test_filename_from(
        #[case] candidate: &str,
        #[case] counter: u32,
        #[case] role: Role,
        #[case] storage_type: StorageType,
        #[case] expected: &str,
    ) {
        let mut doc = make_test_document();
        doc.storage_type = storage_type;
        assert_eq!(FilenameGenerator::default().filename_from(candidate, &doc, counter, role), expected);
    }

    #[rstest]
    #[case(0, StorageType::Unencrypted)]
    #[case(7, StorageType::Unencrypted)]
    #[case(123, StorageType::Gpg)]
    fn test_long_title_leaves_room_for_suffix(#[case] counter: u32, #[case] storage_type: StorageType) {
        let mut doc = make_test_document();
        doc.title = "Ä".repeat(300);
        doc.storage_type = storage_type;
        let name = generator("bills/{title}").filename(&doc, counter, Role::Archive);
        let (directory, file) = name.rsplit_once('/').unwrap();
        assert_eq!(directory, "bills");
        assert!(file.len() <= MAX_SEGMENT_BYTES, "{} bytes", file.len());
        assert!(file.starts_with("ÄÄÄ"));
        assert!(file.ends_with(&FilenameGenerator::default().filename_from("", &doc, counter, Role::Archive)[7..]));
    }

    #[test]
    fn test_long_title_can_be_claimed() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = make_test_document();
        doc.title = "x".repeat(255);
        doc.storage_type = StorageType::Gpg;
        let name = generator("{title}").filename(&doc, 1, Role::Archive);
        assert!(name.ends_with("x_01.pdf.gpg"));
        std::fs::write(dir.path().join(&name), b"").unwrap();
    }
}
