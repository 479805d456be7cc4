//! Zipping per-field header responses into article records
//!
//! The server answers one header field per `XZHDR` request. For a batch
//! window the multiplexer asks for each tracked field in turn and merges
//! the answers by position: the first field creates the records, every
//! later field must report the same article ids in the same order.

use crate::article::{ArticleRecord, HeaderField};
use crate::commands::parse_header_lines;
use crate::compact;
use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use tracing::{debug, trace};

/// Inclusive range of article ids fetched as one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    /// First article id
    pub lower: u64,
    /// Last article id
    pub upper: u64,
}

impl BatchWindow {
    /// Window starting at `lower`, at most `batch_size` wide and never past `high`
    ///
    /// Returns `None` once `lower` is beyond `high`.
    pub fn starting_at(lower: u64, high: u64, batch_size: u64) -> Option<Self> {
        if lower > high || batch_size == 0 {
            return None;
        }
        let upper = lower.saturating_add(batch_size - 1).min(high);
        Some(Self { lower, upper })
    }

    /// First window to fetch given the stored watermark
    ///
    /// A zero watermark means the group was never harvested and the crawl
    /// starts at the server's low mark.
    pub fn first(low: u64, high: u64, watermark: u64, batch_size: u64) -> Option<Self> {
        if watermark >= high {
            return None;
        }
        let lower = if watermark == 0 { low } else { watermark + 1 };
        Self::starting_at(lower, high, batch_size)
    }

    /// Window right after this one
    pub fn next(self, high: u64, batch_size: u64) -> Option<Self> {
        let lower = self.upper.checked_add(1)?;
        Self::starting_at(lower, high, batch_size)
    }

    /// Number of article ids covered
    pub fn width(&self) -> u64 {
        self.upper - self.lower + 1
    }
}

/// Anything that can answer an `XZHDR` request with a raw compact block
#[async_trait]
pub trait HeaderSource: Send {
    /// Fetch the still-encoded block for `field` over `window`
    async fn fetch_header_block(
        &mut self,
        field: HeaderField,
        window: BatchWindow,
    ) -> Result<Vec<u8>>;
}

/// Merge one decoded field response into `records`
///
/// With `is_first`, each line starts a new record. Otherwise line `i`
/// must carry the article id of record `i`, and the line count must
/// match the record count. Returns the number of lines merged.
pub fn merge_field(
    records: &mut Vec<ArticleRecord>,
    field: HeaderField,
    plaintext: &[u8],
    group_id: i64,
    is_first: bool,
) -> Result<usize> {
    let mut count = 0;

    for (index, line) in parse_header_lines(plaintext).enumerate() {
        if is_first {
            let mut record = ArticleRecord::new(line.article_id, group_id);
            record.set_field(field, line.value);
            records.push(record);
        } else {
            match records.get_mut(index) {
                Some(record) if record.article_id == line.article_id => {
                    record.set_field(field, line.value);
                }
                other => {
                    return Err(HarvestError::Alignment {
                        field: field.wire_name(),
                        index,
                        expected: other.map(|r| r.article_id),
                        found: Some(line.article_id),
                    });
                }
            }
        }
        count += 1;
    }

    if !is_first && count != records.len() {
        return Err(HarvestError::Alignment {
            field: field.wire_name(),
            index: count,
            expected: records.get(count).map(|r| r.article_id),
            found: None,
        });
    }

    trace!("Merged {} {} values", count, field);
    Ok(count)
}

/// Fetch, decode and merge one field for a window
pub async fn fetch_field<S>(
    source: &mut S,
    field: HeaderField,
    window: BatchWindow,
    group_id: i64,
    records: &mut Vec<ArticleRecord>,
    is_first: bool,
) -> Result<usize>
where
    S: HeaderSource + ?Sized,
{
    let block = source.fetch_header_block(field, window).await?;
    let plaintext = compact::decode(&block)?;
    merge_field(records, field, &plaintext, group_id, is_first)
}

/// Drives every tracked field over a window, in order
#[derive(Debug, Clone)]
pub struct HeaderMultiplexer {
    fields: Vec<HeaderField>,
}

impl HeaderMultiplexer {
    /// Multiplexer for `fields`; the first one defines record identity
    pub fn new(fields: Vec<HeaderField>) -> Self {
        Self { fields }
    }

    /// Fields in query order
    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    /// Fetch all fields for `window` and return the aligned records
    ///
    /// Any failure discards the partial batch.
    pub async fn fetch_window<S>(
        &self,
        source: &mut S,
        window: BatchWindow,
        group_id: i64,
    ) -> Result<Vec<ArticleRecord>>
    where
        S: HeaderSource + ?Sized,
    {
        let mut records = Vec::with_capacity(window.width().min(4096) as usize);

        for (position, field) in self.fields.iter().enumerate() {
            let merged =
                fetch_field(source, *field, window, group_id, &mut records, position == 0).await?;
            debug!(
                "{} {}-{}: {} values",
                field, window.lower, window.upper, merged
            );
        }

        Ok(records)
    }
}

impl Default for HeaderMultiplexer {
    fn default() -> Self {
        Self::new(HeaderField::TRACKED.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lines(entries: &[(u64, &str)]) -> Vec<u8> {
        entries
            .iter()
            .flat_map(|(id, value)| format!("{id} {value}\r\n").into_bytes())
            .collect()
    }

    #[test]
    fn test_first_window_from_low_mark() {
        assert_eq!(
            BatchWindow::first(1, 25, 0, 10),
            Some(BatchWindow { lower: 1, upper: 10 })
        );
        assert_eq!(
            BatchWindow::first(5, 7, 0, 10),
            Some(BatchWindow { lower: 5, upper: 7 })
        );
    }

    #[test]
    fn test_first_window_after_watermark() {
        assert_eq!(
            BatchWindow::first(1, 25, 20, 10),
            Some(BatchWindow { lower: 21, upper: 25 })
        );
        assert_eq!(BatchWindow::first(1, 25, 25, 10), None);
        assert_eq!(BatchWindow::first(1, 25, 30, 10), None);
    }

    #[test]
    fn test_window_sequence() {
        let mut windows = Vec::new();
        let mut window = BatchWindow::first(1, 25, 0, 10);
        while let Some(w) = window {
            windows.push((w.lower, w.upper));
            window = w.next(25, 10);
        }
        assert_eq!(windows, [(1, 10), (11, 20), (21, 25)]);
    }

    #[test]
    fn test_window_at_u64_max() {
        let w = BatchWindow::starting_at(u64::MAX - 1, u64::MAX, 10).unwrap();
        assert_eq!(w.upper, u64::MAX);
        assert_eq!(w.next(u64::MAX, 10), None);
    }

    #[test]
    fn test_merge_aligned_fields() {
        let mut records = Vec::new();
        merge_field(
            &mut records,
            HeaderField::Subject,
            &lines(&[(40, "a"), (41, "b")]),
            3,
            true,
        )
        .unwrap();
        merge_field(
            &mut records,
            HeaderField::Bytes,
            &lines(&[(40, "100"), (41, "2048")]),
            3,
            false,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].article_id, 40);
        assert_eq!(records[0].group_id, 3);
        assert_eq!(records[0].subject, b"a");
        assert_eq!(records[1].bytes, 2048);
    }

    #[test]
    fn test_merge_mismatched_id() {
        let mut records = Vec::new();
        let subjects = lines(&[(38, "a"), (39, "b"), (40, "c"), (41, "d")]);
        merge_field(&mut records, HeaderField::Subject, &subjects, 1, true).unwrap();

        let ids = lines(&[(38, "<a>"), (39, "<b>"), (40, "<c>"), (42, "<e>")]);
        let err = merge_field(&mut records, HeaderField::MessageId, &ids, 1, false).unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Alignment {
                field: "Message-ID",
                index: 3,
                expected: Some(41),
                found: Some(42),
            }
        ));
    }

    #[test]
    fn test_merge_more_lines_than_records() {
        let mut records = Vec::new();
        merge_field(&mut records, HeaderField::Subject, &lines(&[(1, "a")]), 1, true).unwrap();
        let err = merge_field(
            &mut records,
            HeaderField::From,
            &lines(&[(1, "x"), (2, "y")]),
            1,
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Alignment {
                index: 1,
                expected: None,
                ..
            }
        ));
    }

    #[test]
    fn test_merge_fewer_lines_than_records() {
        let mut records = Vec::new();
        merge_field(
            &mut records,
            HeaderField::Subject,
            &lines(&[(1, "a"), (2, "b")]),
            1,
            true,
        )
        .unwrap();
        let err =
            merge_field(&mut records, HeaderField::Date, &lines(&[(1, "x")]), 1, false).unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Alignment {
                index: 1,
                expected: Some(2),
                found: None,
                ..
            }
        ));
    }

    #[test]
    fn test_short_read_on_first_field() {
        let mut records = Vec::new();
        let mut block = lines(&[(1, "a"), (2, "b")]);
        block.extend_from_slice(b"3 no line end");
        let merged = merge_field(&mut records, HeaderField::Subject, &block, 1, true).unwrap();
        assert_eq!(merged, 2);
    }

    /// Serves pre-built plaintext per field, encoded on the fly
    struct FieldMap(HashMap<HeaderField, Vec<u8>>);

    #[async_trait]
    impl HeaderSource for FieldMap {
        async fn fetch_header_block(
            &mut self,
            field: HeaderField,
            _window: BatchWindow,
        ) -> Result<Vec<u8>> {
            let plaintext = self.0.get(&field).cloned().unwrap_or_default();
            compact::encode(&plaintext)
        }
    }

    #[tokio::test]
    async fn test_fetch_window_all_fields() {
        let mut map = HashMap::new();
        map.insert(HeaderField::Subject, lines(&[(7, "hello"), (8, "world")]));
        map.insert(HeaderField::MessageId, lines(&[(7, "<7@x>"), (8, "<8@x>")]));
        map.insert(HeaderField::From, lines(&[(7, "a@x"), (8, "b@x")]));
        map.insert(HeaderField::Date, lines(&[(7, "d7"), (8, "d8")]));
        map.insert(HeaderField::Bytes, lines(&[(7, "70"), (8, "80")]));
        let mut source = FieldMap(map);

        let records = HeaderMultiplexer::default()
            .fetch_window(&mut source, BatchWindow { lower: 7, upper: 8 }, 2)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].article_id, 8);
        assert_eq!(records[1].subject, b"world");
        assert_eq!(records[1].message_id, b"<8@x>");
        assert_eq!(records[1].poster, b"b@x");
        assert_eq!(records[1].posted_at, b"d8");
        assert_eq!(records[1].bytes, 80);
    }

    #[tokio::test]
    async fn test_fetch_window_decode_failure() {
        struct Broken;

        #[async_trait]
        impl HeaderSource for Broken {
            async fn fetch_header_block(
                &mut self,
                _field: HeaderField,
                _window: BatchWindow,
            ) -> Result<Vec<u8>> {
                Ok(b"not a compact block".to_vec())
            }
        }

        let result = HeaderMultiplexer::default()
            .fetch_window(&mut Broken, BatchWindow { lower: 1, upper: 1 }, 1)
            .await;
        assert!(matches!(result, Err(HarvestError::Format(_))));
    }
}
