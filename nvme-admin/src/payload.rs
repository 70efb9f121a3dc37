//! Payload extraction from transport output
//!
//! Without `--raw-binary` the `nvme` tool prints the data buffer as a hex dump
//! framed by a header and an ascii column:
//!
//! ```text
//!        0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f
//! 0000: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f "................"
//! ```

use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::{AdminError, Result};

lazy_static! {
    static ref HEX_DUMP_LINE: Regex =
        Regex::new(r"(?i-u)\b(?:[0-9a-f]{2} ){15}[0-9a-f]{2}\b").expect("hex dump regex is valid");
}

/// How a transport encodes the data buffer in its stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadFormat {
    /// the bytes are written to stdout unchanged
    Binary,
    /// lines of 16 hex bytes
    #[default]
    HexDump,
}

/// Turn the residual stdout of a command into the raw data buffer
pub fn extract(residual: &[u8], format: PayloadFormat) -> Result<Vec<u8>> {
    match format {
        PayloadFormat::Binary => Ok(residual.to_vec()),
        PayloadFormat::HexDump => parse_hex_dump(residual),
    }
}

/// Concatenate the bytes of all hex dump lines in `text`.
///
/// Only the first run of 16 byte groups in each line is used, anything else
/// (headers, offsets, the ascii column) is skipped.
pub fn parse_hex_dump(text: &[u8]) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut lines = 0;

    for line in text.split(|&b| b == b'\n') {
        let Some(row) = HEX_DUMP_LINE.find(line) else {
            continue;
        };
        for group in row.as_bytes().split(|&b| b == b' ') {
            data.push(hex_byte(group)?);
        }
        lines += 1;
    }

    if lines == 0 {
        return Err(AdminError::MalformedPayload(
            "no hex dump lines found in output".into(),
        ));
    }
    log::trace!("parsed {lines} hex dump lines, {} bytes", data.len());

    Ok(data)
}

fn hex_byte(group: &[u8]) -> Result<u8> {
    core::str::from_utf8(group)
        .ok()
        .filter(|hex| hex.len() == 2 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
        .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        .ok_or_else(|| {
            AdminError::MalformedPayload(format!(
                "invalid hex byte {:?}",
                String::from_utf8_lossy(group)
            ))
        })
}

/// Render `data` the way the `nvme` tool prints it
pub fn format_hex_dump(data: &[u8]) -> String {
    let mut out = String::from("       0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f\n");
    for (index, row) in data.chunks(16).enumerate() {
        out.push_str(&format!("{:04x}:", index * 16));
        for byte in row {
            out.push_str(&format!(" {byte:02x}"));
        }
        out.push_str(" \"");
        out.extend(row.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push_str("\"\n");
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_dump_with_header_and_footer() {
        let text = b"Admin Command Identify is Success and result: 0x00000000\n\
       0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f\n\
0000: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f \"................\"\n\
0010: F0 F1 F2 F3 F4 F5 F6 F7 F8 F9 FA FB FC FD FE FF \"................\"\n\
done\n";

        let data = parse_hex_dump(text).unwrap();

        assert_eq!(32, data.len());
        assert_eq!(0x0f, data[15]);
        assert_eq!(0xf0, data[16]);
        assert_eq!(0xff, data[31]);
    }

    #[test]
    fn partial_lines_are_ignored() {
        let text = b"0000: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f\n0010: 10 11 12\n";
        assert_eq!(16, parse_hex_dump(text).unwrap().len());
    }

    #[test]
    fn hex_bytes() {
        assert_eq!(0xab, hex_byte(b"ab").unwrap());
        assert_eq!(0xab, hex_byte(b"AB").unwrap());
        assert!(matches!(hex_byte(b"g0"), Err(AdminError::MalformedPayload(_))));
        assert!(matches!(hex_byte(b"+f"), Err(AdminError::MalformedPayload(_))));
        assert!(matches!(hex_byte(b"abc"), Err(AdminError::MalformedPayload(_))));
    }

    #[test]
    fn no_lines_is_malformed() {
        assert!(matches!(
            parse_hex_dump(b"NVMe status: something went wrong\n"),
            Err(AdminError::MalformedPayload(_))
        ));
        assert!(matches!(parse_hex_dump(b""), Err(AdminError::MalformedPayload(_))));
    }

    #[test]
    fn formatted_dump_parses_back() {
        let data: Vec<u8> = (0..=255u8).chain(0..=255u8).collect();
        let text = format_hex_dump(&data);
        assert_eq!(data, parse_hex_dump(text.as_bytes()).unwrap());
    }

    #[test]
    fn binary_is_passed_through() {
        let data = [0u8, 1, 2, 0xff];
        assert_eq!(data.to_vec(), extract(&data, PayloadFormat::Binary).unwrap());
    }
}
