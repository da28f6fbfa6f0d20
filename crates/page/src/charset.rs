//! Content-type parsing and charset resolution.
//!
//! The normalizer never decodes text; it only decides which charset a
//! downstream parser should use. Resolution is deterministic:
//!
//! ```text
//! Content-Type header
//!        │
//!        ▼
//! ┌──────────────────────────────────┐
//! │ 1. parse  type/subtype; params   │──malformed──▶ unset (or error, strict)
//! ├──────────────────────────────────┤
//! │ 2. explicit charset parameter    │──unknown────▶ unset (or error, strict)
//! │    recognized → canonical name   │
//! ├──────────────────────────────────┤
//! │ 3. text/* without parameter      │
//! │    → FetchConfig default         │
//! ├──────────────────────────────────┤
//! │ 4. anything else → unset         │
//! └──────────────────────────────────┘
//! ```
//!
//! An unrecognized explicit label does not fall back to the text default:
//! the server told us the bytes are *not* in that default, so guessing it
//! would mislabel the content.
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use encoding_rs::Encoding;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::LoadError;

/// A recognized character set: a canonical name plus the decoder for it.
///
/// Labels are resolved with the WHATWG Encoding Standard table, so every
/// `Charset` carries an [`Encoding`] that can decode the body. The name is
/// the decoder's name, except for the few IANA charsets WHATWG folds into a
/// superset (`ISO-8859-1`, `US-ASCII`, `ISO-8859-9`, `TIS-620`,
/// `ISO-8859-11`); those keep the name the server declared, and that name
/// still resolves to the same decoder.
#[derive(Clone, Copy)]
pub struct Charset {
    name: &'static str,
    encoding: &'static Encoding,
}

impl Charset {
    pub const UTF_8: Charset = Charset {
        name: "UTF-8",
        encoding: &encoding_rs::UTF_8_INIT,
    };
    pub const US_ASCII: Charset = Charset {
        name: "US-ASCII",
        encoding: &encoding_rs::WINDOWS_1252_INIT,
    };
    pub const ISO_8859_1: Charset = Charset {
        name: "ISO-8859-1",
        encoding: &encoding_rs::WINDOWS_1252_INIT,
    };
    pub const WINDOWS_1252: Charset = Charset {
        name: "windows-1252",
        encoding: &encoding_rs::WINDOWS_1252_INIT,
    };

    /// Looks up a charset label, ignoring ASCII case and surrounding
    /// whitespace.
    ///
    /// Labels that only select the "replacement" decoder (`iso-2022-kr`,
    /// `hz-gb-2312`, ...) are not recognized, since nothing could be decoded
    /// with them.
    ///
    /// ```rust
    /// use page::Charset;
    ///
    /// assert_eq!(Charset::from_label("utf8"), Some(Charset::UTF_8));
    /// assert_eq!(Charset::from_label(" Latin1 ").map(|c| c.name()), Some("ISO-8859-1"));
    /// assert_eq!(Charset::from_label("x-sjis").map(|c| c.name()), Some("Shift_JIS"));
    /// assert_eq!(Charset::from_label("x-unknown"), None);
    /// ```
    pub fn from_label(label: &str) -> Option<Charset> {
        let label = label.trim();
        let label = lookup(EXTRA_LABELS, label).unwrap_or(label);
        let encoding = Encoding::for_label_no_replacement(label.as_bytes())?;
        let name = lookup(IANA_NAMES, label).unwrap_or_else(|| encoding.name());
        Some(Charset { name, encoding })
    }

    /// Canonical name, e.g. `"UTF-8"` or `"Shift_JIS"`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Decoder for this charset.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }
}

fn lookup(table: &[(&str, &'static str)], label: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(label))
        .map(|&(_, target)| target)
}

// Names are unique per decoder, so they are the identity.
impl PartialEq for Charset {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Charset {}

impl Hash for Charset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Charset").field(&self.name).finish()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl AsRef<str> for Charset {
    fn as_ref(&self) -> &str {
        self.name
    }
}

impl PartialEq<str> for Charset {
    fn eq(&self, other: &str) -> bool {
        self.name == other
    }
}

impl PartialEq<&str> for Charset {
    fn eq(&self, other: &&str) -> bool {
        self.name == *other
    }
}

/// A charset label that [`Charset::from_label`] does not recognize.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown charset label {0:?}")]
pub struct UnknownCharset(pub String);

impl FromStr for Charset {
    type Err = UnknownCharset;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Charset::from_label(label).ok_or_else(|| UnknownCharset(label.to_string()))
    }
}

impl Serialize for Charset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

impl<'de> Deserialize<'de> for Charset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

// IANA names that WHATWG maps onto a superset decoder. Every label here
// resolves, via `Encoding::for_label`, to the decoder its name does.
const IANA_NAMES: &[(&str, &str)] = &[
    ("iso-8859-1", "ISO-8859-1"),
    ("iso8859-1", "ISO-8859-1"),
    ("iso88591", "ISO-8859-1"),
    ("iso_8859-1", "ISO-8859-1"),
    ("iso_8859-1:1987", "ISO-8859-1"),
    ("iso-ir-100", "ISO-8859-1"),
    ("csisolatin1", "ISO-8859-1"),
    ("latin1", "ISO-8859-1"),
    ("l1", "ISO-8859-1"),
    ("ibm819", "ISO-8859-1"),
    ("cp819", "ISO-8859-1"),
    ("us-ascii", "US-ASCII"),
    ("ascii", "US-ASCII"),
    ("ansi_x3.4-1968", "US-ASCII"),
    ("iso-8859-9", "ISO-8859-9"),
    ("iso8859-9", "ISO-8859-9"),
    ("iso88599", "ISO-8859-9"),
    ("iso_8859-9", "ISO-8859-9"),
    ("iso_8859-9:1989", "ISO-8859-9"),
    ("iso-ir-148", "ISO-8859-9"),
    ("csisolatin5", "ISO-8859-9"),
    ("latin5", "ISO-8859-9"),
    ("l5", "ISO-8859-9"),
    ("tis-620", "TIS-620"),
    ("iso-8859-11", "ISO-8859-11"),
    ("iso8859-11", "ISO-8859-11"),
    ("iso885911", "ISO-8859-11"),
];

// Common aliases outside the WHATWG table (JDK and IANA registry names),
// mapped to a WHATWG label for the same decoder.
const EXTRA_LABELS: &[(&str, &str)] = &[
    ("latin9", "iso-8859-15"),
    ("latin-9", "iso-8859-15"),
    ("iso646-us", "us-ascii"),
    ("csascii", "us-ascii"),
    ("cp936", "gbk"),
    ("ms936", "gbk"),
    ("cp932", "shift_jis"),
    ("cp949", "euc-kr"),
    ("ms949", "euc-kr"),
    ("cp950", "big5"),
    ("ms950", "big5"),
];

/// Why a `Content-Type` value could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MediaTypeError {
    #[error("missing '/' in media type {0:?}")]
    MissingSlash(String),

    #[error("invalid media type {0:?}")]
    InvalidType(String),

    #[error("parameter {0:?} has no value")]
    MissingValue(String),

    #[error("invalid parameter name {0:?}")]
    InvalidParamName(String),

    #[error("stray quote in {0:?}")]
    StrayQuote(String),

    #[error("unterminated quoted value {0:?}")]
    UnterminatedQuote(String),
}

/// A parsed `Content-Type` value.
///
/// The raw header string is what gets stored on the page; this type only
/// exists to answer "what is the primary type" and "is there a charset".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    primary: String,
    subtype: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    /// Parses `type/subtype` followed by `;`-separated parameters.
    ///
    /// Type, subtype and parameter names are lowercased. Parameter values
    /// keep their case; quoted values are unquoted.
    ///
    /// ```rust
    /// use page::MediaType;
    ///
    /// let media = MediaType::parse(r#"Text/HTML; Charset="utf-8""#).unwrap();
    /// assert_eq!(media.essence(), "text/html");
    /// assert_eq!(media.param("charset"), Some("utf-8"));
    /// ```
    pub fn parse(value: &str) -> Result<MediaType, MediaTypeError> {
        let mut segments = split_unquoted(value).into_iter();
        let essence = segments.next().unwrap_or_default();
        let essence = essence.trim();
        let Some((primary, subtype)) = essence.split_once('/') else {
            return Err(MediaTypeError::MissingSlash(essence.to_string()));
        };
        let (primary, subtype) = (primary.trim(), subtype.trim());
        if !is_token(primary) || !is_token(subtype) {
            return Err(MediaTypeError::InvalidType(essence.to_string()));
        }

        let mut params = Vec::new();
        for segment in segments {
            let segment = segment.trim();
            // Trailing or doubled ';' is common in the wild.
            if segment.is_empty() {
                continue;
            }
            let Some((name, raw_value)) = segment.split_once('=') else {
                return Err(MediaTypeError::MissingValue(segment.to_string()));
            };
            let name = name.trim();
            if !is_token(name) {
                return Err(MediaTypeError::InvalidParamName(name.to_string()));
            }
            params.push((name.to_ascii_lowercase(), unquote(raw_value.trim())?));
        }

        Ok(MediaType {
            primary: primary.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params,
        })
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.primary, self.subtype)
    }

    /// First value of the named parameter (name matched case-insensitively).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_text(&self) -> bool {
        self.primary == "text"
    }
}

/// Resolves the charset for a raw `Content-Type` value.
///
/// Returns `Ok(None)` when nothing can be determined. Errors are only
/// produced when `cfg.strict_charset` is set.
pub(crate) fn resolve_charset(
    content_type: Option<&str>,
    cfg: &FetchConfig,
) -> Result<Option<Charset>, LoadError> {
    let Some(raw) = content_type else {
        return Ok(None);
    };

    let media = match MediaType::parse(raw) {
        Ok(media) => media,
        Err(reason) => {
            if cfg.strict_charset {
                return Err(LoadError::MalformedContentType {
                    value: raw.to_string(),
                    reason,
                });
            }
            warn!(content_type = %raw, %reason, "content_type_unparsable");
            return Ok(None);
        }
    };

    // An empty `charset=` counts as absent.
    match media.param("charset").filter(|label| !label.trim().is_empty()) {
        Some(label) => match Charset::from_label(label) {
            Some(charset) => Ok(Some(charset)),
            None if cfg.strict_charset => Err(LoadError::UnsupportedCharset(label.to_string())),
            None => {
                warn!(content_type = %raw, charset = %label, "charset_unrecognized");
                Ok(None)
            }
        },
        None if media.is_text() => {
            let fallback = cfg.default_text_charset;
            if let Some(charset) = fallback {
                debug!(content_type = %raw, %charset, "default_charset_applied");
            }
            Ok(fallback)
        }
        None => Ok(None),
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

// Splits on ';' outside double quotes.
fn split_unquoted(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (idx, ch) in value.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&value[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(value: &str) -> Result<String, MediaTypeError> {
    let Some(inner) = value.strip_prefix('"') else {
        if value.contains('"') {
            return Err(MediaTypeError::StrayQuote(value.to_string()));
        }
        return Ok(value.to_string());
    };
    let Some(inner) = inner.strip_suffix('"') else {
        return Err(MediaTypeError::UnterminatedQuote(value.to_string()));
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lenient() -> FetchConfig {
        FetchConfig::default()
    }

    fn strict() -> FetchConfig {
        FetchConfig {
            strict_charset: true,
            ..Default::default()
        }
    }

    #[test]
    fn explicit_charset_is_normalized() {
        let cases = [
            ("text/html; charset=UTF-8", "UTF-8"),
            ("text/html; charset=utf-8", "UTF-8"),
            ("text/html;charset=\"utf8\"", "UTF-8"),
            ("application/xhtml+xml; CHARSET=Shift-JIS", "Shift_JIS"),
            ("text/plain; format=flowed; charset=latin1", "ISO-8859-1"),
            ("application/json; charset=cp1252", "windows-1252"),
        ];
        for (raw, expected) in cases {
            let resolved = resolve_charset(Some(raw), &lenient()).expect("lenient never fails");
            assert_eq!(resolved.map(|c| c.name()), Some(expected), "{raw}");
        }
    }

    #[test]
    fn explicit_charset_beats_text_default() {
        let resolved = resolve_charset(Some("text/plain; charset=windows-1251"), &lenient())
            .expect("resolves");
        assert_eq!(resolved.map(|c| c.name()), Some("windows-1251"));
    }

    #[test]
    fn whatwg_aliases_resolve() {
        let cases = [
            ("unicode-1-1-utf-8", "UTF-8"),
            ("x-unicode20utf8", "UTF-8"),
            ("866", "IBM866"),
            ("ibm866", "IBM866"),
            ("csisolatin2", "ISO-8859-2"),
            ("l3", "ISO-8859-3"),
            ("latin4", "ISO-8859-4"),
            ("cyrillic", "ISO-8859-5"),
            ("asmo-708", "ISO-8859-6"),
            ("greek", "ISO-8859-7"),
            ("hebrew", "ISO-8859-8"),
            ("logical", "ISO-8859-8-I"),
            ("iso-8859-10", "ISO-8859-10"),
            ("latin6", "ISO-8859-10"),
            ("iso-8859-13", "ISO-8859-13"),
            ("iso-8859-14", "ISO-8859-14"),
            ("iso-8859-15", "ISO-8859-15"),
            ("l9", "ISO-8859-15"),
            ("iso-8859-16", "ISO-8859-16"),
            ("koi8", "KOI8-R"),
            ("koi8-ru", "KOI8-U"),
            ("mac", "macintosh"),
            ("macintosh", "macintosh"),
            ("x-mac-cyrillic", "x-mac-cyrillic"),
            ("dos-874", "windows-874"),
            ("windows-874", "windows-874"),
            ("x-cp1250", "windows-1250"),
            ("cp1253", "windows-1253"),
            ("cp1254", "windows-1254"),
            ("cp1255", "windows-1255"),
            ("cp1256", "windows-1256"),
            ("cp1257", "windows-1257"),
            ("cp1258", "windows-1258"),
            ("x-cp1252", "windows-1252"),
            ("chinese", "GBK"),
            ("gb2312", "GBK"),
            ("x-gbk", "GBK"),
            ("gb18030", "gb18030"),
            ("big5-hkscs", "Big5"),
            ("cseucpkdfmtjapanese", "EUC-JP"),
            ("x-euc-jp", "EUC-JP"),
            ("csiso2022jp", "ISO-2022-JP"),
            ("csshiftjis", "Shift_JIS"),
            ("ms932", "Shift_JIS"),
            ("windows-31j", "Shift_JIS"),
            ("x-sjis", "Shift_JIS"),
            ("ks_c_5601-1987", "EUC-KR"),
            ("windows-949", "EUC-KR"),
            ("utf-16", "UTF-16LE"),
            ("unicodefffe", "UTF-16BE"),
            ("x-user-defined", "x-user-defined"),
        ];
        for (label, expected) in cases {
            let raw = format!("text/html; charset={label}");
            let resolved = resolve_charset(Some(raw.as_str()), &strict()).expect("known label");
            assert_eq!(resolved.map(|c| c.name()), Some(expected), "{label}");
        }
    }

    #[test]
    fn superset_folds_keep_declared_name() {
        let cases = [
            ("csISOLatin1", "ISO-8859-1"),
            ("iso_8859-1:1987", "ISO-8859-1"),
            ("ascii", "US-ASCII"),
            ("iso646-us", "US-ASCII"),
            ("latin5", "ISO-8859-9"),
            ("TIS-620", "TIS-620"),
            ("iso-8859-11", "ISO-8859-11"),
        ];
        for (label, expected) in cases {
            let charset = Charset::from_label(label).expect("known label");
            assert_eq!(charset.name(), expected, "{label}");
        }
    }

    #[test]
    fn common_non_whatwg_aliases_resolve() {
        let cases = [
            ("latin9", "ISO-8859-15"),
            ("cp936", "GBK"),
            ("cp932", "Shift_JIS"),
            ("cp949", "EUC-KR"),
            ("cp950", "Big5"),
        ];
        for (label, expected) in cases {
            assert_eq!(Charset::from_label(label).map(|c| c.name()), Some(expected), "{label}");
        }
    }

    #[test]
    fn every_name_resolves_to_its_own_decoder() {
        let labels = [
            "utf-8", "latin1", "ascii", "latin5", "tis-620", "iso-8859-11", "sjis", "cp936",
            "koi8-u", "utf-16be", "logical", "windows-1252",
        ];
        for label in labels {
            let charset = Charset::from_label(label).expect("known label");
            let by_name = Encoding::for_label(charset.name().as_bytes());
            assert_eq!(by_name, Some(charset.encoding()), "{label}");
            assert_eq!(Charset::from_label(charset.name()), Some(charset), "{label}");
        }
    }

    #[test]
    fn resolved_charset_decodes_the_body() {
        let charset = Charset::from_label("latin1").expect("known label");
        let (text, had_errors) = charset.encoding().decode_without_bom_handling(b"caf\xe9");
        assert!(!had_errors);
        assert_eq!(text, "caf\u{e9}");

        let sjis = Charset::from_label("shift_jis").expect("known label");
        let (text, _, had_errors) = sjis.encoding().decode(&[0x82, 0xa0]);
        assert!(!had_errors);
        assert_eq!(text, "\u{3042}");
    }

    #[test]
    fn replacement_and_undecodable_labels_are_unknown() {
        for label in ["iso-2022-kr", "hz-gb-2312", "csiso2022kr", "utf-32", "x-made-up", ""] {
            assert_eq!(Charset::from_label(label), None, "{label:?}");
        }
        assert_eq!(
            "utf-32".parse::<Charset>(),
            Err(UnknownCharset("utf-32".to_string()))
        );
    }

    #[test]
    fn text_types_get_the_default() {
        for raw in ["text/html", "TEXT/CSV", "text/plain; format=fixed", "text/html; charset="] {
            let resolved = resolve_charset(Some(raw), &lenient()).expect("resolves");
            assert_eq!(resolved, Some(Charset::ISO_8859_1), "{raw}");
        }
    }

    #[test]
    fn non_text_types_stay_unset() {
        for raw in ["application/octet-stream", "image/png", "application/json"] {
            assert_eq!(resolve_charset(Some(raw), &lenient()).expect("resolves"), None);
        }
    }

    #[test]
    fn missing_header_stays_unset() {
        assert_eq!(resolve_charset(None, &lenient()).expect("resolves"), None);
        assert_eq!(resolve_charset(None, &strict()).expect("resolves"), None);
    }

    #[test]
    fn disabled_default_leaves_text_unset() {
        let cfg = FetchConfig {
            default_text_charset: None,
            ..Default::default()
        };
        assert_eq!(resolve_charset(Some("text/html"), &cfg).expect("resolves"), None);
    }

    #[test]
    fn malformed_content_type_degrades_or_fails() {
        for raw in ["html", "text/", "text/html; charset", "text/html; charset=\"utf-8"] {
            assert_eq!(resolve_charset(Some(raw), &lenient()).expect("lenient"), None, "{raw}");
            assert!(
                matches!(
                    resolve_charset(Some(raw), &strict()),
                    Err(LoadError::MalformedContentType { .. })
                ),
                "{raw}"
            );
        }
    }

    #[test]
    fn unknown_charset_does_not_fall_back() {
        let raw = "text/html; charset=x-made-up";
        assert_eq!(resolve_charset(Some(raw), &lenient()).expect("lenient"), None);
        assert!(matches!(
            resolve_charset(Some(raw), &strict()),
            Err(LoadError::UnsupportedCharset(label)) if label == "x-made-up"
        ));
    }

    #[test]
    fn media_type_errors_are_typed() {
        assert_eq!(
            MediaType::parse("html"),
            Err(MediaTypeError::MissingSlash("html".to_string()))
        );
        assert_eq!(
            MediaType::parse("text/html; charset"),
            Err(MediaTypeError::MissingValue("charset".to_string()))
        );
        assert_eq!(
            MediaType::parse("text/html; charset=\"utf-8"),
            Err(MediaTypeError::UnterminatedQuote("\"utf-8".to_string()))
        );
        assert!(matches!(
            MediaType::parse("text/html; charset=ut\"f8"),
            Err(MediaTypeError::StrayQuote(_))
        ));
    }

    #[test]
    fn quoted_values_may_contain_semicolons() {
        let media = MediaType::parse(r#"multipart/mixed; boundary="a;b\"c"; charset=utf-8"#)
            .expect("parses");
        assert_eq!(media.param("boundary"), Some("a;b\"c"));
        assert_eq!(media.param("CHARSET"), Some("utf-8"));
        assert_eq!(media.essence(), "multipart/mixed");
        assert!(!media.is_text());
    }

    #[test]
    fn charset_serde_uses_canonical_name() {
        let json = serde_json::to_string(&Charset::UTF_8).expect("serializes");
        assert_eq!(json, "\"UTF-8\"");
        let back: Charset = serde_json::from_str("\"latin1\"").expect("deserializes");
        assert_eq!(back, Charset::ISO_8859_1);
        assert!(serde_json::from_str::<Charset>("\"nope\"").is_err());
    }
}
