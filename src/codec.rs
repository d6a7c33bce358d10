//! On-disk frame codec for kaf log files.
//!
//! A log file is a DB header followed by zero or more record frames:
//!
//! ```text
//! KAF_DB|v1|<start>
//! \nKAF_MSG|<num>|<sz>\n<sz payload bytes>
//! \nKAF_MSG|<num>|<sz>\n<sz payload bytes>
//! ...
//! ```
//!
//! The DB header runs from offset 0 to the first `\n` (or end of file) and
//! carries the starting sequence number of the file. Each record frame opens
//! with the `\n` that terminates whatever came before it, so frame
//! boundaries can be found without ambiguity when stepping through the file
//! with line-oriented tools.
//!
//! The codec reads and writes through the caller's file handle but keeps no
//! state of its own: no counters, no channels.

use std::io::SeekFrom;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{Error, Result};

/// Literal prefix of the DB header at offset 0.
pub const DB_HEADER_PREFIX: &[u8] = b"KAF_DB|v1|";

/// Literal prefix of every record frame, leading newline included.
pub const REC_HEADER_PREFIX: &[u8] = b"\nKAF_MSG|";

/// Window size for header reads. Large enough for any record header: the
/// prefix plus two 10-digit numbers, a divider and a terminator.
const HEADER_WINDOW: usize = 32;

/// In-RAM locator for one record: its number and the file offset of the
/// `\n` that opens its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub num: u32,
    pub offset: u64,
}

/// A decoded record frame, payload not yet read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFrame {
    /// Offset the frame was decoded at.
    pub offset: u64,
    /// Length of the framing header; the payload starts at
    /// `offset + header_len`.
    pub header_len: usize,
    pub num: u32,
    pub sz: u32,
}

/// A fully-materialized record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub num: u32,
    pub data: Bytes,
}

/// Outcome of decoding at an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// No bytes at this offset.
    Eof,
    /// The whole window was newlines; the cursor may skip this many bytes.
    Padding(usize),
    Frame(RecordFrame),
}

/// Encodes the DB header for a file whose numbering starts after `start`.
pub fn encode_db_header(start: u32) -> Vec<u8> {
    format!("KAF_DB|v1|{start}").into_bytes()
}

/// Parses the DB header from a window read at offset 0.
///
/// Returns the starting sequence number and the header length, i.e. the
/// offset of the `\n` that opens the first record frame (or end of file).
pub fn parse_db_header(buf: &[u8]) -> Result<(u32, usize)> {
    if !buf.starts_with(DB_HEADER_PREFIX) {
        return Err(Error::corrupt("invalid db header"));
    }
    let end = buf
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(buf.len());
    let digits = &buf[DB_HEADER_PREFIX.len()..end];
    let start = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| Error::corrupt("invalid db header start number"))?;
    Ok((start, end))
}

/// Encodes a record framing header.
pub fn encode_record_header(num: u32, sz: u32) -> Vec<u8> {
    format!("\nKAF_MSG|{num}|{sz}\n").into_bytes()
}

/// Decodes a record frame from a window read at `offset`.
///
/// Leading newlines are skipped; the `\n` immediately before the first
/// non-newline byte is the frame start. The frame must carry the
/// [`REC_HEADER_PREFIX`], exactly two `|`-separated decimal fields, and a
/// `\n` terminator, all within the window.
pub fn decode_frame(buf: &[u8], offset: u64) -> Result<Decoded> {
    if buf.is_empty() {
        return Ok(Decoded::Eof);
    }

    let first = match buf.iter().position(|&b| b != b'\n') {
        Some(i) => i,
        None => return Ok(Decoded::Padding(buf.len())),
    };
    if first == 0 {
        return Err(Error::corrupt("record header does not open with newline"));
    }

    let start = first - 1;
    if !buf[start..].starts_with(REC_HEADER_PREFIX) {
        return Err(Error::corrupt("invalid record header prefix"));
    }

    let fields_at = start + REC_HEADER_PREFIX.len();
    let end = buf[fields_at..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| fields_at + i)
        .ok_or_else(|| Error::corrupt("record header not terminated"))?;

    let mut fields = buf[fields_at..end].split(|&b| b == b'|');
    let num = parse_field(fields.next(), "record number")?;
    let sz = parse_field(fields.next(), "record size")?;
    if fields.next().is_some() {
        return Err(Error::corrupt("extra '|' in record header"));
    }

    Ok(Decoded::Frame(RecordFrame {
        offset,
        header_len: end + 1,
        num,
        sz,
    }))
}

fn parse_field(field: Option<&[u8]>, what: &str) -> Result<u32> {
    field
        .and_then(|f| std::str::from_utf8(f).ok())
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| Error::corrupt(format!("invalid {what} in record header")))
}

/// Reads a window at `offset` and decodes the frame there.
pub async fn read_frame_at(file: &mut File, offset: u64, file_size: u64) -> Result<Decoded> {
    if offset >= file_size {
        return Ok(Decoded::Eof);
    }
    let want = HEADER_WINDOW.min((file_size - offset) as usize);
    let mut buf = vec![0u8; want];
    file.seek(SeekFrom::Start(offset)).await?;
    file.read_exact(&mut buf).await?;
    decode_frame(&buf, offset)
}

/// Reads the record a descriptor points at, payload included.
///
/// The number found on disk must match the descriptor's cached number; a
/// mismatch means the file changed under us and is surfaced as corruption.
pub async fn read_record(file: &mut File, desc: Descriptor, file_size: u64) -> Result<Message> {
    let frame = match read_frame_at(file, desc.offset, file_size).await? {
        Decoded::Frame(frame) => frame,
        Decoded::Eof | Decoded::Padding(_) => {
            return Err(Error::corrupt("record missing at cached offset"));
        }
    };
    if frame.num != desc.num {
        return Err(Error::corrupt("record number on disk does not match cache"));
    }

    let mut data = vec![0u8; frame.sz as usize];
    file.seek(SeekFrom::Start(desc.offset + frame.header_len as u64))
        .await?;
    file.read_exact(&mut data).await?;

    Ok(Message {
        num: frame.num,
        data: Bytes::from(data),
    })
}

/// Walks the whole file and rebuilds the descriptor list.
///
/// Returns the last assigned number (the DB header's start number if the
/// file holds no records) and the descriptors in file order. Record numbers
/// must strictly increase; frames with number 0 are stepped over without
/// being collected.
pub async fn scan(file: &mut File, file_size: u64) -> Result<(u32, Vec<Descriptor>)> {
    let want = HEADER_WINDOW.min(file_size as usize);
    let mut buf = vec![0u8; want];
    file.seek(SeekFrom::Start(0)).await?;
    file.read_exact(&mut buf).await?;
    let (start, header_len) = parse_db_header(&buf)?;

    let mut lastmsg = start;
    let mut descriptors = Vec::new();
    let mut offset = header_len as u64;
    while offset < file_size {
        match read_frame_at(file, offset, file_size).await? {
            Decoded::Eof => break,
            Decoded::Padding(n) => offset += n as u64,
            Decoded::Frame(frame) => {
                if frame.num > 0 {
                    if frame.num <= lastmsg {
                        return Err(Error::corrupt("record numbers did not increase"));
                    }
                    descriptors.push(Descriptor {
                        num: frame.num,
                        offset,
                    });
                    lastmsg = frame.num;
                }
                offset += frame.header_len as u64 + frame.sz as u64;
            }
        }
    }

    Ok((lastmsg, descriptors))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    async fn open_fixture(content: &[u8]) -> (tempfile::TempDir, File, u64) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content).unwrap();
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .await
            .unwrap();
        (dir, file, content.len() as u64)
    }

    #[test]
    fn should_encode_db_header_with_start_number() {
        // given/when
        let header = encode_db_header(7);

        // then
        assert_eq!(header, b"KAF_DB|v1|7");
    }

    #[test]
    fn should_parse_db_header_without_records() {
        // given - a fresh file is just the header, no newline yet
        let buf = b"KAF_DB|v1|0";

        // when
        let (start, len) = parse_db_header(buf).unwrap();

        // then
        assert_eq!(start, 0);
        assert_eq!(len, 11);
    }

    #[test]
    fn should_parse_db_header_up_to_first_newline() {
        // given
        let buf = b"KAF_DB|v1|42\nKAF_MSG|43|5\nhello";

        // when
        let (start, len) = parse_db_header(buf).unwrap();

        // then
        assert_eq!(start, 42);
        assert_eq!(len, 12);
    }

    #[test]
    fn should_reject_db_header_with_wrong_prefix() {
        // given
        let buf = b"KAF_DB|v2|0";

        // when
        let result = parse_db_header(buf);

        // then
        assert!(matches!(result, Err(Error::CorruptFrame(_))));
    }

    #[test]
    fn should_reject_db_header_with_non_numeric_start() {
        // given
        let buf = b"KAF_DB|v1|abc";

        // when
        let result = parse_db_header(buf);

        // then
        assert!(matches!(result, Err(Error::CorruptFrame(_))));
    }

    #[test]
    fn should_decode_frame_with_leading_newline() {
        // given
        let buf = b"\nKAF_MSG|3|5\nhello trailing bytes";

        // when
        let decoded = decode_frame(buf, 100).unwrap();

        // then
        let Decoded::Frame(frame) = decoded else {
            panic!("expected frame, got {decoded:?}");
        };
        assert_eq!(frame.offset, 100);
        assert_eq!(frame.header_len, 13);
        assert_eq!(frame.num, 3);
        assert_eq!(frame.sz, 5);
    }

    #[test]
    fn should_report_eof_for_empty_window() {
        assert_eq!(decode_frame(b"", 0).unwrap(), Decoded::Eof);
    }

    #[test]
    fn should_report_padding_for_all_newline_window() {
        assert_eq!(decode_frame(b"\n\n\n", 0).unwrap(), Decoded::Padding(3));
    }

    #[test]
    fn should_reject_frame_not_opening_with_newline() {
        // given - window positioned directly on the 'K'
        let buf = b"KAF_MSG|1|5\nhello";

        // when
        let result = decode_frame(buf, 0);

        // then
        assert!(matches!(result, Err(Error::CorruptFrame(_))));
    }

    #[test]
    fn should_reject_frame_with_extra_divider() {
        // given
        let buf = b"\nKAF_MSG|1|5|9\nhello";

        // when
        let result = decode_frame(buf, 0);

        // then
        assert!(matches!(result, Err(Error::CorruptFrame(_))));
    }

    #[test]
    fn should_reject_frame_with_non_numeric_number() {
        let result = decode_frame(b"\nKAF_MSG|one|5\nhello", 0);
        assert!(matches!(result, Err(Error::CorruptFrame(_))));
    }

    #[test]
    fn should_reject_frame_without_terminator_in_window() {
        // given - no '\n' after the size field anywhere in the window
        let buf = b"\nKAF_MSG|1|5";

        // when
        let result = decode_frame(buf, 0);

        // then
        assert!(matches!(result, Err(Error::CorruptFrame(_))));
    }

    #[test]
    fn should_roundtrip_record_header() {
        // given
        let header = encode_record_header(12, 3400);

        // when
        let decoded = decode_frame(&header, 0).unwrap();

        // then
        let Decoded::Frame(frame) = decoded else {
            panic!("expected frame");
        };
        assert_eq!(frame.num, 12);
        assert_eq!(frame.sz, 3400);
        assert_eq!(frame.header_len, header.len());
    }

    #[tokio::test]
    async fn should_scan_records_in_order() {
        // given
        let content = b"KAF_DB|v1|0\nKAF_MSG|1|5\nhello\nKAF_MSG|2|2\nhi";
        let (_dir, mut file, size) = open_fixture(content).await;

        // when
        let (lastmsg, descriptors) = scan(&mut file, size).await.unwrap();

        // then
        assert_eq!(lastmsg, 2);
        assert_eq!(
            descriptors,
            vec![
                Descriptor { num: 1, offset: 11 },
                Descriptor { num: 2, offset: 29 },
            ]
        );
    }

    #[tokio::test]
    async fn should_scan_empty_log() {
        // given
        let (_dir, mut file, size) = open_fixture(b"KAF_DB|v1|0").await;

        // when
        let (lastmsg, descriptors) = scan(&mut file, size).await.unwrap();

        // then
        assert_eq!(lastmsg, 0);
        assert!(descriptors.is_empty());
    }

    #[tokio::test]
    async fn should_seed_lastmsg_from_header_start_number() {
        // given - an archived-tail file: header start 7, records from 8
        let content = b"KAF_DB|v1|7\nKAF_MSG|8|2\nm8";
        let (_dir, mut file, size) = open_fixture(content).await;

        // when
        let (lastmsg, descriptors) = scan(&mut file, size).await.unwrap();

        // then
        assert_eq!(lastmsg, 8);
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].num, 8);
    }

    #[tokio::test]
    async fn should_fail_scan_when_numbers_do_not_increase() {
        // given
        let content = b"KAF_DB|v1|0\nKAF_MSG|2|2\nm2\nKAF_MSG|2|2\nm2";
        let (_dir, mut file, size) = open_fixture(content).await;

        // when
        let result = scan(&mut file, size).await;

        // then
        assert!(matches!(result, Err(Error::CorruptFrame(_))));
    }

    #[tokio::test]
    async fn should_fail_scan_when_start_exceeds_first_record() {
        // given - header claims numbering starts after 5 but record 3 follows
        let content = b"KAF_DB|v1|5\nKAF_MSG|3|2\nm3";
        let (_dir, mut file, size) = open_fixture(content).await;

        // when
        let result = scan(&mut file, size).await;

        // then
        assert!(matches!(result, Err(Error::CorruptFrame(_))));
    }

    #[tokio::test]
    async fn should_scan_identically_twice() {
        // given
        let content = b"KAF_DB|v1|0\nKAF_MSG|1|5\nhello\nKAF_MSG|2|2\nhi";
        let (_dir, mut file, size) = open_fixture(content).await;

        // when
        let first = scan(&mut file, size).await.unwrap();
        let second = scan(&mut file, size).await.unwrap();

        // then
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn should_read_record_payload() {
        // given
        let content = b"KAF_DB|v1|0\nKAF_MSG|1|5\nhello";
        let (_dir, mut file, size) = open_fixture(content).await;
        let desc = Descriptor { num: 1, offset: 11 };

        // when
        let message = read_record(&mut file, desc, size).await.unwrap();

        // then
        assert_eq!(message.num, 1);
        assert_eq!(message.data, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn should_fail_read_when_cached_number_mismatches() {
        // given - descriptor claims record 9 where record 1 lives
        let content = b"KAF_DB|v1|0\nKAF_MSG|1|5\nhello";
        let (_dir, mut file, size) = open_fixture(content).await;
        let desc = Descriptor { num: 9, offset: 11 };

        // when
        let result = read_record(&mut file, desc, size).await;

        // then
        assert!(matches!(result, Err(Error::CorruptFrame(_))));
    }
}
