//! CRLF line scanner over a growing read buffer.
//!
//! The scanner keeps no state of its own: the caller passes the offset at
//! which the previous scan stopped and gets back where to resume, so a line
//! split across any number of reads is found without rescanning bytes.

/// Result of scanning for the next `\r\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// A full line ends at `end` (exclusive, CR not included); the next
    /// line starts at `next`.
    Complete { end: usize, next: usize },
    /// No terminator yet. Scan again from `resume` once more bytes arrive.
    Incomplete { resume: usize },
    /// Bare `\n`, or `\r` followed by something other than `\n`.
    Malformed { at: usize },
}

/// Scans `buf[from..]` for the next CRLF.
pub fn scan_line(buf: &[u8], from: usize) -> LineStatus {
    let mut i = from;
    while i < buf.len() {
        match buf[i] {
            b'\r' => {
                return match buf.get(i + 1) {
                    None => LineStatus::Incomplete { resume: i },
                    Some(b'\n') => LineStatus::Complete { end: i, next: i + 2 },
                    Some(_) => LineStatus::Malformed { at: i },
                };
            }
            b'\n' => return LineStatus::Malformed { at: i },
            _ => i += 1,
        }
    }
    LineStatus::Incomplete { resume: buf.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_crlf() {
        assert_eq!(scan_line(b"GET / HTTP/1.1\r\nHost", 0), LineStatus::Complete { end: 14, next: 16 });
    }

    #[test]
    fn resumes_from_offset() {
        let buf = b"a\r\nbc\r\n";
        assert_eq!(scan_line(buf, 3), LineStatus::Complete { end: 5, next: 7 });
    }

    #[test]
    fn empty_line_is_complete() {
        assert_eq!(scan_line(b"\r\n", 0), LineStatus::Complete { end: 0, next: 2 });
    }

    #[test]
    fn trailing_cr_waits_on_the_cr() {
        assert_eq!(scan_line(b"abc\r", 0), LineStatus::Incomplete { resume: 3 });
        assert_eq!(scan_line(b"abc\r\n", 3), LineStatus::Complete { end: 3, next: 5 });
    }

    #[test]
    fn no_terminator_resumes_at_end() {
        assert_eq!(scan_line(b"abc", 0), LineStatus::Incomplete { resume: 3 });
        assert_eq!(scan_line(b"", 0), LineStatus::Incomplete { resume: 0 });
    }

    #[test]
    fn bare_lf_and_lone_cr_are_malformed() {
        assert_eq!(scan_line(b"abc\ndef", 0), LineStatus::Malformed { at: 3 });
        assert_eq!(scan_line(b"abc\rdef", 0), LineStatus::Malformed { at: 3 });
    }
}
