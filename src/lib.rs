#![doc = include_str!("../README.md")]

/// Article header records and tracked fields
pub mod article;
mod client;
/// NNTP command builders and response parsers
pub mod commands;
/// Compact (yEnc-escaped raw DEFLATE) header blocks
pub mod compact;
mod config;
mod error;
/// Resumable batch ingestion
pub mod ingest;
/// Log output setup
pub mod logging;
/// Per-field header multiplexing
pub mod multiplex;
/// NZB export of harvested articles
pub mod nzb;
mod response;
/// Sentinel-delimited response scanning
pub mod scan;
/// Persistent article storage
pub mod store;

pub use article::{ArticleRecord, HeaderField};
pub use client::{NntpClient, NntpIo};
pub use commands::GroupInfo;
pub use config::{
    DEFAULT_BATCH_SIZE, DEFAULT_BUSY_BACKOFF, DEFAULT_TLS_PORT, HarvestSettings, ServerConfig,
};
pub use error::{HarvestError, Result};
pub use ingest::{HarvestReport, Harvester, harvest_session};
pub use multiplex::{BatchWindow, HeaderMultiplexer, HeaderSource};
pub use nzb::{Nzb, NzbBuilder, NzbFile, NzbSegment};
pub use response::{NntpResponse, Status, codes};
pub use store::{ArticleStore, DEFAULT_DATABASE, SqliteStore};
