//! NZB export of harvested articles
//!
//! Posts whose subject names a file and a part counter, like
//! `[3/7] - "movie.part1.rar" yEnc (12/40)`, are grouped per file. Each
//! file lists the groups it was seen in and one segment per part.
//!
//! Reference: https://sabnzbd.org/wiki/extra/nzb-spec

use crate::article::ArticleRecord;
use crate::error::{HarvestError, Result};
use chrono::DateTime;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{info, warn};

/// File name and part counter taken from a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectParts<'a> {
    /// Quoted file name, without the quotes
    pub file: &'a [u8],
    /// This post's part number
    pub part: u32,
    /// Total number of parts
    pub total: u32,
}

/// Split `... "file" (part/total)` into its pieces
///
/// The counter must close the subject (trailing whitespace aside) and be
/// separated from the quoted name by whitespace. Returns `None` otherwise.
pub fn parse_subject(subject: &[u8]) -> Option<SubjectParts<'_>> {
    let inner = subject.trim_ascii_end().strip_suffix(b")")?;
    let open = inner.iter().rposition(|&b| b == b'(')?;
    let (part, total) = parse_counter(&inner[open + 1..])?;

    let before = &inner[..open];
    let quoted = before.trim_ascii_end();
    if quoted.len() == before.len() {
        return None;
    }
    let quoted = quoted.strip_suffix(b"\"")?;
    let start = quoted.iter().rposition(|&b| b == b'"')? + 1;
    let file = &quoted[start..];
    if file.is_empty() {
        return None;
    }

    Some(SubjectParts { file, part, total })
}

fn parse_counter(counter: &[u8]) -> Option<(u32, u32)> {
    let slash = counter.iter().position(|&b| b == b'/')?;
    Some((
        parse_digits(&counter[..slash])?,
        parse_digits(&counter[slash + 1..])?,
    ))
}

fn parse_digits(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Header bytes as text: UTF-8 when valid, otherwise one char per byte (Latin-1)
pub fn header_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Message-ID without its angle brackets
fn bare_message_id(message_id: &[u8]) -> &[u8] {
    let id = message_id.strip_prefix(b"<").unwrap_or(message_id);
    id.strip_suffix(b">").unwrap_or(id)
}

/// One NZB document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nzb {
    /// Files in the order they were first seen
    pub files: Vec<NzbFile>,
}

/// A file assembled from its parts
#[derive(Debug, Clone, PartialEq)]
pub struct NzbFile {
    /// File name from the subject
    pub name: String,
    /// Poster of the first part seen
    pub poster: String,
    /// Unix timestamp of the first part seen, 0 when its Date did not parse
    pub date: i64,
    /// Total part count announced by the subject
    pub total: u32,
    /// Newsgroups the parts were seen in
    pub groups: Vec<String>,
    /// Parts by number
    pub segments: Vec<NzbSegment>,
}

/// One part of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NzbSegment {
    /// Article size from the Bytes header
    pub bytes: u64,
    /// Part number from the subject
    pub number: u32,
    /// Message-ID without angle brackets
    pub message_id: String,
}

impl NzbFile {
    /// Subject attribute written for this file
    pub fn subject(&self) -> String {
        format!("{} (1/{})", self.name, self.total)
    }

    /// Part numbers in `1..=total` with no segment
    pub fn missing_segments(&self) -> Vec<u32> {
        (1..=self.total)
            .filter(|n| !self.segments.iter().any(|s| s.number == *n))
            .collect()
    }
}

/// Collects articles into an [`Nzb`]
#[derive(Debug, Default)]
pub struct NzbBuilder {
    files: Vec<NzbFile>,
    by_name: HashMap<Vec<u8>, usize>,
}

impl NzbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one article seen in `group`
    ///
    /// Returns `false` when the subject carries no file name and counter.
    pub fn add(&mut self, group: &str, record: &ArticleRecord) -> bool {
        let Some(parts) = parse_subject(&record.subject) else {
            warn!("Couldn't parse subject: {}", header_text(&record.subject));
            return false;
        };

        let index = match self.by_name.get(parts.file) {
            Some(index) => *index,
            None => {
                let name = header_text(parts.file);
                info!("Found file: {}", name);
                self.files.push(NzbFile {
                    name,
                    poster: header_text(&record.poster),
                    date: posted_timestamp(&record.posted_at),
                    total: parts.total,
                    groups: Vec::new(),
                    segments: Vec::new(),
                });
                self.by_name.insert(parts.file.to_vec(), self.files.len() - 1);
                self.files.len() - 1
            }
        };

        let file = &mut self.files[index];
        if !file.groups.iter().any(|g| g == group) {
            file.groups.push(group.to_string());
        }
        file.segments.push(NzbSegment {
            bytes: record.bytes,
            number: parts.part,
            message_id: header_text(bare_message_id(&record.message_id)),
        });
        true
    }

    /// Finish the document; each file's segments end up ordered by number
    ///
    /// A part seen twice under the same Message-ID (cross-posts) is kept once.
    pub fn build(mut self) -> Nzb {
        for file in &mut self.files {
            file.segments.sort_by_key(|s| s.number);
            file.segments
                .dedup_by(|a, b| a.number == b.number && a.message_id == b.message_id);
        }
        Nzb { files: self.files }
    }
}

/// Date header as a Unix timestamp, 0 when it is not RFC 2822
fn posted_timestamp(posted_at: &[u8]) -> i64 {
    DateTime::parse_from_rfc2822(header_text(posted_at).trim())
        .map(|date| date.timestamp())
        .unwrap_or(0)
}

impl Nzb {
    /// Group `(group name, article)` rows into files
    pub fn from_articles<'a, I>(articles: I) -> Self
    where
        I: IntoIterator<Item = &'a (String, ArticleRecord)>,
    {
        let mut builder = NzbBuilder::new();
        for (group, record) in articles {
            builder.add(group, record);
        }
        builder.build()
    }

    /// Render the document with an XML declaration and NZB 1.0 doctype
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let mut root = BytesStart::new("nzb");
        root.push_attribute(("xmlns", "http://www.newzbin.com/DTD/2003/nzb"));
        writer.write_event(Event::Start(root)).map_err(xml_error)?;

        for file in &self.files {
            let mut element = BytesStart::new("file");
            element.push_attribute(("poster", file.poster.as_str()));
            element.push_attribute(("date", file.date.to_string().as_str()));
            element.push_attribute(("subject", file.subject().as_str()));
            writer.write_event(Event::Start(element)).map_err(xml_error)?;

            start(&mut writer, "groups")?;
            for group in &file.groups {
                start(&mut writer, "group")?;
                writer
                    .write_event(Event::Text(BytesText::new(group)))
                    .map_err(xml_error)?;
                end(&mut writer, "group")?;
            }
            end(&mut writer, "groups")?;

            start(&mut writer, "segments")?;
            for segment in &file.segments {
                let mut element = BytesStart::new("segment");
                element.push_attribute(("bytes", segment.bytes.to_string().as_str()));
                element.push_attribute(("number", segment.number.to_string().as_str()));
                writer.write_event(Event::Start(element)).map_err(xml_error)?;
                writer
                    .write_event(Event::Text(BytesText::new(&segment.message_id)))
                    .map_err(xml_error)?;
                end(&mut writer, "segment")?;
            }
            end(&mut writer, "segments")?;

            end(&mut writer, "file")?;
        }

        end(&mut writer, "nzb")?;

        let body = String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| HarvestError::Format(format!("NZB output is not UTF-8: {}", e)))?;

        let mut xml = String::with_capacity(body.len() + 160);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<!DOCTYPE nzb PUBLIC \"-//newzBin//DTD NZB 1.0//EN\" \"http://www.newzbin.com/DTD/nzb/nzb-1.0.dtd\">\n");
        xml.push_str(&body);
        xml.push('\n');
        Ok(xml)
    }
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn start(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)
}

fn end(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

fn xml_error(e: impl std::fmt::Display) -> HarvestError {
    HarvestError::Format(format!("Failed to write NZB: {}", e))
}
