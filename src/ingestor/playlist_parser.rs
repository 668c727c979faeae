//! Two-pass playlist parser
//!
//! The first pass classifies every line into a [`Token`]. The second pass pairs
//! `#EXTINF` tokens with the stream URL that follows them and tracks
//! `label,#genre#` sections, producing a flat list of [`PlaylistEntry`] values.
//! Matching logic never sees raw lines.
//!
//! Supported input forms:
//! - `#EXTINF:-1 tvg-id="x" group-title="g",Name` followed by a URL line
//! - `Name,http://host/stream` simple lines
//! - `Label,#genre#` section headers (the label becomes the group of the
//!   following simple lines and may carry a `YYYYMMDD` date token)

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::models::{Attributes, PlaylistEntry, attribute, set_attribute};
use crate::utils::time::parse_date_token;

const SECTION_MARKER: &str = "#genre#";

/// A recoverable problem found while parsing; the offending unit is skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

impl From<ParseIssue> for AppError {
    fn from(issue: ParseIssue) -> Self {
        AppError::parse(issue.line, issue.message)
    }
}

/// Result of parsing one playlist text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPlaylist {
    /// The leading `#EXTM3U ...` line, verbatim
    pub header: Option<String>,
    pub entries: Vec<PlaylistEntry>,
    pub issues: Vec<ParseIssue>,
}

#[derive(Debug, Clone, PartialEq)]
struct ExtinfLine {
    duration: String,
    attributes: Attributes,
    name: String,
}

/// Classification of a single line
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Header(String),
    Extinf(ExtinfLine),
    Url(String),
    Simple { name: String, url: String },
    Section { label: String },
    Comment,
    Blank,
    Malformed(String),
}

/// Section currently in effect while pairing
#[derive(Debug, Default)]
struct Section {
    label: Option<String>,
    date: Option<NaiveDate>,
}

/// Playlist parser configured with the line marker and the optional
/// section date pattern
#[derive(Debug, Clone)]
pub struct PlaylistParser {
    variant_regex: Regex,
    scheme_regex: Regex,
    section_date_pattern: Option<Regex>,
}

impl PlaylistParser {
    /// Create a parser that splits `<name> <marker>N` into name and variant
    pub fn new(line_marker: &str) -> AppResult<Self> {
        let variant_regex = Regex::new(&format!(
            r"^(.*?)\s*{}\s*(\d+)$",
            regex::escape(line_marker.trim())
        ))
        .map_err(|e| AppError::configuration(format!("invalid line marker: {e}")))?;
        let scheme_regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://")
            .map_err(|e| AppError::configuration(format!("invalid scheme pattern: {e}")))?;

        Ok(Self {
            variant_regex,
            scheme_regex,
            section_date_pattern: None,
        })
    }

    /// Extract a `YYYYMMDD` token from section labels with `pattern`; its first
    /// capture group (or the whole match) is the token
    pub fn with_section_date_pattern(mut self, pattern: Regex) -> Self {
        self.section_date_pattern = Some(pattern);
        self
    }

    /// Parse playlist text; never fails, problems are collected as issues
    pub fn parse(&self, content: &str) -> ParsedPlaylist {
        let tokens = self.tokenize(content);
        let parsed = self.pair(tokens);

        if !parsed.issues.is_empty() {
            debug!(
                "Parsed {} entries with {} issues",
                parsed.entries.len(),
                parsed.issues.len()
            );
        }
        parsed
    }

    /// Split a display name into its base name and line variant
    pub fn split_variant(&self, name: &str) -> (String, u32) {
        let name = name.trim();
        if let Some(caps) = self.variant_regex.captures(name) {
            let base = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let variant = caps
                .get(2)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(1)
                .max(1);
            if !base.is_empty() {
                return (base.to_string(), variant);
            }
        }
        (name.to_string(), 1)
    }

    fn tokenize(&self, content: &str) -> Vec<(usize, Token)> {
        content
            .trim_start_matches('\u{feff}')
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, self.classify_line(line.trim())))
            .collect()
    }

    fn classify_line(&self, line: &str) -> Token {
        if line.is_empty() {
            return Token::Blank;
        }
        if line.starts_with("#EXTM3U") {
            return Token::Header(line.to_string());
        }
        if line.starts_with("#EXTINF") {
            return match parse_extinf_line(line) {
                Some(extinf) => Token::Extinf(extinf),
                None => Token::Malformed("invalid EXTINF format: missing comma".to_string()),
            };
        }
        if line.starts_with('#') {
            return Token::Comment;
        }
        if self.scheme_regex.is_match(line) {
            return Token::Url(line.to_string());
        }

        match line.split_once(',') {
            Some((label, rest)) if rest.trim().eq_ignore_ascii_case(SECTION_MARKER) => {
                Token::Section {
                    label: label.trim().to_string(),
                }
            }
            Some((name, rest)) => {
                let url = rest.trim();
                if url.starts_with("http://") || url.starts_with("https://") {
                    Token::Simple {
                        name: name.trim().to_string(),
                        url: url.to_string(),
                    }
                } else {
                    Token::Malformed(format!("'{url}' is not an http(s) URL"))
                }
            }
            None => Token::Malformed(format!("unrecognized line '{line}'")),
        }
    }

    fn pair(&self, tokens: Vec<(usize, Token)>) -> ParsedPlaylist {
        let mut parsed = ParsedPlaylist::default();
        let mut pending: Option<(usize, ExtinfLine)> = None;
        let mut section = Section::default();

        for (line, token) in tokens {
            match token {
                Token::Header(header) => {
                    if parsed.header.is_none() && parsed.entries.is_empty() {
                        parsed.header = Some(header);
                    }
                }
                Token::Extinf(extinf) => {
                    if let Some((orphan, _)) = pending.replace((line, extinf)) {
                        parsed.issue(orphan, "EXTINF without stream URL");
                    }
                }
                Token::Url(url) => match pending.take() {
                    Some((_, extinf)) => {
                        let entry = self.entry_from_extinf(extinf, url, &section, parsed.entries.len());
                        parsed.entries.push(entry);
                    }
                    None => parsed.issue(line, "stream URL without EXTINF"),
                },
                Token::Simple { name, url } => {
                    if let Some((orphan, _)) = pending.take() {
                        parsed.issue(orphan, "EXTINF without stream URL");
                    }
                    let entry = self.entry_from_simple(name, url, &section, parsed.entries.len());
                    parsed.entries.push(entry);
                }
                Token::Section { label } => {
                    if let Some((orphan, _)) = pending.take() {
                        parsed.issue(orphan, "EXTINF without stream URL");
                    }
                    section = self.open_section(label, line, &mut parsed);
                }
                Token::Comment | Token::Blank => {}
                Token::Malformed(message) => parsed.issue(line, message),
            }
        }

        if let Some((orphan, _)) = pending {
            parsed.issue(orphan, "EXTINF without stream URL");
        }

        parsed
    }

    fn open_section(&self, label: String, line: usize, parsed: &mut ParsedPlaylist) -> Section {
        let date = match &self.section_date_pattern {
            Some(pattern) => match pattern.captures(&label) {
                Some(caps) => {
                    let token = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str());
                    match token.and_then(parse_date_token) {
                        Some(date) => Some(date),
                        None => {
                            warn!("Section '{}' at line {} has an unparsable date", label, line);
                            parsed.issue(line, format!("unparsable section date in '{label}'"));
                            None
                        }
                    }
                }
                None => None,
            },
            None => None,
        };

        Section {
            label: Some(label).filter(|l| !l.is_empty()),
            date,
        }
    }

    fn entry_from_extinf(
        &self,
        extinf: ExtinfLine,
        url: String,
        section: &Section,
        line_index: usize,
    ) -> PlaylistEntry {
        let group = attribute(&extinf.attributes, "group-title")
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .or_else(|| section.label.clone());
        let (base_name, variant) = self.split_variant(&extinf.name);

        PlaylistEntry {
            display_name: extinf.name,
            base_name,
            variant,
            duration: extinf.duration,
            attributes: extinf.attributes,
            group,
            url,
            section_date: section.date,
            line_index,
        }
    }

    fn entry_from_simple(
        &self,
        name: String,
        url: String,
        section: &Section,
        line_index: usize,
    ) -> PlaylistEntry {
        let (base_name, variant) = self.split_variant(&name);
        let mut attributes = Attributes::new();
        if let Some(label) = &section.label {
            set_attribute(&mut attributes, "group-title", label);
        }

        PlaylistEntry {
            display_name: name,
            base_name,
            variant,
            duration: "-1".to_string(),
            attributes,
            group: section.label.clone(),
            url,
            section_date: section.date,
            line_index,
        }
    }
}

impl ParsedPlaylist {
    fn issue<S: Into<String>>(&mut self, line: usize, message: S) {
        self.issues.push(ParseIssue {
            line,
            message: message.into(),
        });
    }
}

/// Parse `#EXTINF:<duration> <attrs>,<name>`
///
/// The name starts after the first comma outside quotes, so commas inside
/// attribute values and inside the name itself are both preserved.
fn parse_extinf_line(line: &str) -> Option<ExtinfLine> {
    let content = line
        .strip_prefix("#EXTINF:")
        .or_else(|| line.strip_prefix("#EXTINF"))
        .unwrap_or(line);

    let mut in_quotes = false;
    let mut split_at = None;
    for (idx, ch) in content.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                split_at = Some(idx);
                break;
            }
            _ => {}
        }
    }

    let split_at = split_at?;
    let (head, name) = content.split_at(split_at);
    let name = name[1..].trim().to_string();

    let duration = head.split_whitespace().next().unwrap_or("-1").to_string();

    Some(ExtinfLine {
        duration,
        attributes: parse_extinf_attributes(head),
        name,
    })
}

/// Parse `key="value"` and `key=value` pairs following the duration
fn parse_extinf_attributes(attrs_part: &str) -> Attributes {
    let mut attributes = Attributes::new();

    let mut chars = attrs_part.chars().peekable();
    let mut current_key = String::new();
    let mut current_value = String::new();
    let mut in_quotes = false;
    let mut in_key = false;
    let mut in_value = false;

    while let Some(ch) = chars.next() {
        match ch {
            ' ' | '\t' if !in_quotes => {
                if in_value {
                    // End of unquoted value
                    if !current_key.is_empty() && !current_value.is_empty() {
                        set_attribute(&mut attributes, &current_key, &current_value);
                    }
                    current_value.clear();
                    in_value = false;
                }
                current_key.clear();
                in_key = true;
            }
            '=' if !in_quotes && in_key => {
                in_key = false;
                in_value = true;
                if chars.peek() == Some(&'"') {
                    chars.next();
                    in_quotes = true;
                }
            }
            '"' if in_value => {
                in_quotes = false;
                if !current_key.is_empty() {
                    set_attribute(&mut attributes, &current_key, &current_value);
                }
                current_key.clear();
                current_value.clear();
                in_value = false;
            }
            _ => {
                if in_key {
                    current_key.push(ch);
                } else if in_value {
                    current_value.push(ch);
                }
            }
        }
    }

    // Handle final unquoted value
    if in_value && !current_key.is_empty() && !current_value.is_empty() {
        set_attribute(&mut attributes, &current_key, &current_value);
    }

    attributes
}
