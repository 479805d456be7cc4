//! Shared fixtures for integration tests: a fake newsgroup, header
//! sources and stores with injected faults, and a scripted NNTP server.

#![allow(dead_code)]

pub mod stores;
pub mod stub_server;

use async_trait::async_trait;
use nntp_harvest::{BatchWindow, HarvestError, HeaderField, HeaderSource, Result, compact};
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

/// One article as the fake server knows it
#[derive(Debug, Clone)]
pub struct FakeArticle {
    pub id: u64,
    pub subject: String,
    pub message_id: String,
    pub from: String,
    pub date: String,
    pub bytes: u64,
}

impl FakeArticle {
    pub fn numbered(id: u64) -> Self {
        Self {
            id,
            subject: format!("Subject {id}"),
            message_id: format!("<{id}@stub.example>"),
            from: format!("poster{id}@stub.example"),
            date: format!("Tue, 01 Jan 2008 00:00:{:02} GMT", id % 60),
            bytes: 1000 + id,
        }
    }

    pub fn value(&self, field: HeaderField) -> String {
        match field {
            HeaderField::Subject => self.subject.clone(),
            HeaderField::MessageId => self.message_id.clone(),
            HeaderField::From => self.from.clone(),
            HeaderField::Date => self.date.clone(),
            HeaderField::Bytes => self.bytes.to_string(),
        }
    }
}

/// Articles of one newsgroup, ordered by id
#[derive(Debug, Clone)]
pub struct FakeGroup {
    pub name: String,
    pub articles: Vec<FakeArticle>,
}

impl FakeGroup {
    /// Group holding every id in `low..=high`
    pub fn with_range(name: &str, low: u64, high: u64) -> Self {
        Self {
            name: name.to_string(),
            articles: (low..=high).map(FakeArticle::numbered).collect(),
        }
    }

    /// Add articles up to `high`
    pub fn grow_to(&mut self, high: u64) {
        let next = self.high() + 1;
        self.articles.extend((next..=high).map(FakeArticle::numbered));
    }

    pub fn low(&self) -> u64 {
        self.articles.first().map(|a| a.id).unwrap_or(0)
    }

    pub fn high(&self) -> u64 {
        self.articles.last().map(|a| a.id).unwrap_or(0)
    }

    /// `GroupInfo` as a 211 response would report it
    pub fn info(&self) -> nntp_harvest::GroupInfo {
        nntp_harvest::GroupInfo {
            count: self.articles.len() as u64,
            low: self.low(),
            high: self.high(),
            name: self.name.clone(),
        }
    }

    /// Decoded XZHDR answer for `field` over `lower..=upper`
    pub fn plaintext(&self, field: HeaderField, lower: u64, upper: u64) -> Vec<u8> {
        self.articles
            .iter()
            .filter(|a| a.id >= lower && a.id <= upper)
            .flat_map(|a| format!("{} {}\r\n", a.id, a.value(field)).into_bytes())
            .collect()
    }
}

/// What a [`FakeSource`] does for one request
#[derive(Debug, Clone)]
pub enum Fault {
    /// Serve this plaintext instead of the group's
    Plaintext(Vec<u8>),
    /// Serve this raw block without encoding it
    RawBlock(Vec<u8>),
    /// Fail like a dropped connection
    Disconnect,
}

/// In-process [`HeaderSource`] backed by a [`FakeGroup`]
pub struct FakeSource {
    pub group: FakeGroup,
    pub requests: Vec<(HeaderField, BatchWindow)>,
    faults: HashMap<(HeaderField, u64), Fault>,
}

impl FakeSource {
    pub fn new(group: FakeGroup) -> Self {
        Self {
            group,
            requests: Vec::new(),
            faults: HashMap::new(),
        }
    }

    /// Replace the answer for `field` in the window starting at `lower`
    pub fn inject(&mut self, field: HeaderField, lower: u64, fault: Fault) {
        self.faults.insert((field, lower), fault);
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// Lower bounds of the windows requested for Subject
    pub fn windows(&self) -> Vec<(u64, u64)> {
        self.requests
            .iter()
            .filter(|(field, _)| *field == HeaderField::Subject)
            .map(|(_, w)| (w.lower, w.upper))
            .collect()
    }
}

#[async_trait]
impl HeaderSource for FakeSource {
    async fn fetch_header_block(
        &mut self,
        field: HeaderField,
        window: BatchWindow,
    ) -> Result<Vec<u8>> {
        self.requests.push((field, window));

        match self.faults.get(&(field, window.lower)) {
            Some(Fault::Plaintext(plaintext)) => compact::encode(plaintext),
            Some(Fault::RawBlock(block)) => Ok(block.clone()),
            Some(Fault::Disconnect) => Err(HarvestError::ConnectionClosed),
            None => compact::encode(&self.group.plaintext(field, window.lower, window.upper)),
        }
    }
}

/// Fresh database path inside a temporary directory
pub fn temp_database() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("harvest.sqlite3");
    (dir, path)
}
