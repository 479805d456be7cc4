//! Group selection

use crate::error::{HarvestError, Result};

/// Build GROUP command
pub fn group(newsgroup: &str) -> String {
    format!("GROUP {}\r\n", newsgroup)
}

/// Group information returned by the GROUP command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    /// Estimated number of articles in the group
    pub count: u64,
    /// Lowest article number
    pub low: u64,
    /// Highest article number
    pub high: u64,
    /// Group name as echoed by the server
    pub name: String,
}

/// Parse the message of a 211 response
///
/// Format: `"count low high name"`. The name is everything after the
/// space following the third number.
pub fn parse_group_line(message: &str) -> Result<GroupInfo> {
    let malformed = || HarvestError::Format(format!("Malformed GROUP response: {}", message));

    let mut rest = message;
    let mut numbers = [0u64; 3];
    for number in &mut numbers {
        let (token, tail) = rest.split_once(' ').ok_or_else(malformed)?;
        *number = token.parse().map_err(|_| malformed())?;
        rest = tail;
    }

    if rest.is_empty() {
        return Err(malformed());
    }

    let [count, low, high] = numbers;
    Ok(GroupInfo {
        count,
        low,
        high,
        name: rest.to_string(),
    })
}
