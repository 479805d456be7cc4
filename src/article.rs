//! Article header records and the tracked header fields

use std::fmt;

/// Header fields fetched with `XZHDR`
///
/// The harvester queries one field per request and zips the results
/// by position, so the order of [`HeaderField::TRACKED`] matters:
/// Subject always comes first and defines record identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeaderField {
    /// `Subject` header
    Subject,
    /// `Message-ID` header
    MessageId,
    /// `From` header, stored as the poster
    From,
    /// `Date` header, stored as the posting time
    Date,
    /// Article size in bytes (`Bytes` metadata item)
    Bytes,
}

impl HeaderField {
    /// Fields stored for every article, in fetch order
    pub const TRACKED: [HeaderField; 5] = [
        HeaderField::Subject,
        HeaderField::MessageId,
        HeaderField::From,
        HeaderField::Date,
        HeaderField::Bytes,
    ];

    /// Field name as sent on the wire
    pub fn wire_name(self) -> &'static str {
        match self {
            HeaderField::Subject => "Subject",
            HeaderField::MessageId => "Message-ID",
            HeaderField::From => "From",
            HeaderField::Date => "Date",
            HeaderField::Bytes => "Bytes",
        }
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Headers of one article, assembled field by field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleRecord {
    /// Article number within the group
    pub article_id: u64,
    /// Store id of the group
    pub group_id: i64,
    /// Subject header, raw bytes as sent by the server
    pub subject: Vec<u8>,
    /// Message-ID header
    pub message_id: Vec<u8>,
    /// From header
    pub poster: Vec<u8>,
    /// Date header, verbatim
    pub posted_at: Vec<u8>,
    /// Article size reported by the server
    pub bytes: u64,
}

impl ArticleRecord {
    /// Start a record from the first tracked field's line
    pub fn new(article_id: u64, group_id: i64) -> Self {
        Self {
            article_id,
            group_id,
            ..Default::default()
        }
    }

    /// Store a raw header value in the slot for `field`
    ///
    /// Values are copied byte for byte with their full length. Usenet
    /// headers are often Latin-1 or raw 8-bit, so no charset is assumed.
    pub fn set_field(&mut self, field: HeaderField, value: &[u8]) {
        let slot = match field {
            HeaderField::Subject => &mut self.subject,
            HeaderField::MessageId => &mut self.message_id,
            HeaderField::From => &mut self.poster,
            HeaderField::Date => &mut self.posted_at,
            HeaderField::Bytes => {
                self.bytes = parse_size(value);
                return;
            }
        };
        slot.clear();
        slot.extend_from_slice(value);
    }
}

/// Parse the leading decimal digits of a size value; anything else counts as 0
fn parse_size(value: &[u8]) -> u64 {
    let digits = value
        .iter()
        .skip_while(|b| **b == b' ')
        .take_while(|b| b.is_ascii_digit());

    let mut size: u64 = 0;
    let mut seen = false;
    for digit in digits {
        seen = true;
        size = size.saturating_mul(10).saturating_add(u64::from(digit - b'0'));
    }

    if !seen {
        tracing::warn!(
            "Non-numeric Bytes value: {:?}",
            String::from_utf8_lossy(value)
        );
    }
    size
}
