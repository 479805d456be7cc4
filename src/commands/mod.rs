//! NNTP command builders and response parsers

pub mod group;
pub mod xzhdr;

pub use group::*;
pub use xzhdr::*;

/// Build AUTHINFO USER command
pub fn authinfo_user(username: &str) -> String {
    format!("AUTHINFO USER {}\r\n", username)
}

/// Build AUTHINFO PASS command
pub fn authinfo_pass(password: &str) -> String {
    format!("AUTHINFO PASS {}\r\n", password)
}

/// Build QUIT command
pub fn quit() -> &'static str {
    "QUIT\r\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authinfo_commands() {
        assert_eq!(authinfo_user("alice"), "AUTHINFO USER alice\r\n");
        assert_eq!(authinfo_pass("s3cret"), "AUTHINFO PASS s3cret\r\n");
        assert_eq!(quit(), "QUIT\r\n");
    }
}
