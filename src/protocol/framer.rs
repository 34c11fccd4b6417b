//! Protocol unit framing.
//!
//! Clients deliver an unstructured byte stream; complete protocol units are
//! extracted from a growing accumulator as their terminators arrive. Command
//! mode frames on CRLF, data mode frames on CRLF "." CRLF. Extraction consumes
//! the unit plus its terminator from the front of the accumulator, so bytes
//! are never lost or seen twice across arbitrarily fragmented reads.

use bytes::BytesMut;

/// Command line terminator.
pub const CRLF: &[u8] = b"\r\n";

/// Message data terminator.
pub const DATA_END: &[u8] = b"\r\n.\r\n";

/// Extract one command line from the accumulator.
///
/// Returns the bytes before the first CRLF and consumes them together with
/// the terminator. Returns `None` when no complete line has arrived yet.
pub fn next_command_line(input: &mut BytesMut) -> Option<BytesMut> {
    split_unit(input, CRLF)
}

/// Extract one message body from the accumulator.
///
/// Returns the bytes before the first CRLF "." CRLF and consumes them
/// together with the terminator. Returns `None` when the terminating
/// sequence has not arrived yet.
pub fn next_data_block(input: &mut BytesMut) -> Option<BytesMut> {
    split_unit(input, DATA_END)
}

fn split_unit(input: &mut BytesMut, terminator: &[u8]) -> Option<BytesMut> {
    let pos = find_terminator(input, terminator)?;
    let unit = input.split_to(pos);
    let _ = input.split_to(terminator.len());
    Some(unit)
}

/// Find `terminator` in `buffer`, returning the position of its first byte.
fn find_terminator(buffer: &[u8], terminator: &[u8]) -> Option<usize> {
    if buffer.len() < terminator.len() {
        return None;
    }
    (0..=buffer.len() - terminator.len()).find(|&i| &buffer[i..i + terminator.len()] == terminator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(bytes: &[u8]) -> BytesMut {
        BytesMut::from(bytes)
    }

    #[test]
    fn test_command_line_extraction() {
        let mut input = buf(b"HELO example.com\r\n");
        let unit = next_command_line(&mut input).unwrap();
        assert_eq!(&unit[..], b"HELO example.com");
        assert!(input.is_empty());
    }

    #[test]
    fn test_incomplete_command_line() {
        let mut input = buf(b"HELO exam");
        assert!(next_command_line(&mut input).is_none());
        // Nothing consumed
        assert_eq!(&input[..], b"HELO exam");
    }

    #[test]
    fn test_bare_cr_is_not_a_terminator() {
        let mut input = buf(b"HELO\rexample\n");
        assert!(next_command_line(&mut input).is_none());
    }

    #[test]
    fn test_multiple_lines_in_one_buffer() {
        let mut input = buf(b"MAIL FROM:<a@x>\r\nRCPT TO:<b@y>\r\n");
        assert_eq!(&next_command_line(&mut input).unwrap()[..], b"MAIL FROM:<a@x>");
        assert_eq!(&next_command_line(&mut input).unwrap()[..], b"RCPT TO:<b@y>");
        assert!(next_command_line(&mut input).is_none());
    }

    #[test]
    fn test_empty_line() {
        let mut input = buf(b"\r\nQUIT\r\n");
        let unit = next_command_line(&mut input).unwrap();
        assert!(unit.is_empty());
        assert_eq!(&next_command_line(&mut input).unwrap()[..], b"QUIT");
    }

    #[test]
    fn test_data_block_extraction() {
        let mut input = buf(b"hello\r\nworld\r\n.\r\nrest");
        let unit = next_data_block(&mut input).unwrap();
        assert_eq!(&unit[..], b"hello\r\nworld");
        assert_eq!(&input[..], b"rest");
    }

    #[test]
    fn test_data_block_needs_full_terminator() {
        // A lone dot line without the leading CRLF does not terminate
        let mut input = buf(b".\r\n");
        assert!(next_data_block(&mut input).is_none());

        // Dot embedded in text does not terminate
        let mut input = buf(b"not.done\r\n");
        assert!(next_data_block(&mut input).is_none());
    }

    #[test]
    fn test_empty_data_block() {
        let mut input = buf(b"\r\n.\r\n");
        let unit = next_data_block(&mut input).unwrap();
        assert!(unit.is_empty());
        assert!(input.is_empty());
    }

    #[test]
    fn test_fragmentation_invariance() {
        // Feeding a stream one byte at a time must produce the same units
        // as feeding it all at once.
        let stream: &[u8] = b"HELO x\r\nMAIL FROM:<a@x>\r\nRCPT TO:<b@y>\r\nDATA\r\n";

        let mut whole = buf(stream);
        let mut expected = Vec::new();
        while let Some(unit) = next_command_line(&mut whole) {
            expected.push(unit.to_vec());
        }

        let mut dribble = BytesMut::new();
        let mut got = Vec::new();
        for &byte in stream {
            dribble.extend_from_slice(&[byte]);
            while let Some(unit) = next_command_line(&mut dribble) {
                got.push(unit.to_vec());
            }
        }

        assert_eq!(got, expected);
        assert_eq!(got.len(), 4);
    }

    #[test]
    fn test_data_terminator_split_across_reads() {
        let mut input = buf(b"body\r\n.");
        assert!(next_data_block(&mut input).is_none());

        input.extend_from_slice(b"\r\n");
        let unit = next_data_block(&mut input).unwrap();
        assert_eq!(&unit[..], b"body");
    }
}
