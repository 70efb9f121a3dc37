//! Completion status parsing of passthrough transport output
//!
//! The `nvme` tool reports the completion of an admin command in several
//! textual shapes depending on verbosity and outcome:
//!
//! * `value:0x<hex>` on stdout (get-feature style result), last one wins
//! * `Success and result: 0x<hex>` as a line on stderr, which takes precedence
//! * a parenthesized status word, e.g. `...Invalid Field in Command(0x4002)`,
//!   on stderr
//! * `latency: <N> us` on stdout, in front of the data buffer
//!
//! None of these are required, a missing token only leaves its field empty.

use lazy_static::lazy_static;
use regex::{bytes, Regex};

use crate::{
    generic_command::{dword3::STATUS_WORD_SHIFT, CompletionDwords, CompletionStatus},
    transport::TransportOutput,
    AdminError, Result,
};

lazy_static! {
    static ref RESULT_VALUE: bytes::Regex =
        bytes::Regex::new(r"value:0x([0-9A-Fa-f]+)").expect("result value regex is valid");
    static ref SUCCESS_RESULT: Regex =
        Regex::new(r"(?m)Success and result: 0x([0-9A-Fa-f]+)[ \t\r]*$")
            .expect("success result regex is valid");
    static ref STATUS_WORD: Regex =
        Regex::new(r"\((?:0x)?([0-9A-Fa-f]+)\)").expect("status word regex is valid");
    static ref LATENCY: bytes::Regex =
        bytes::Regex::new(r"(?s-u)\A.*?latency: ([0-9]+) us\r?\n?").expect("latency regex is valid");
}

/// Completion status together with the data that followed it
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCompletion {
    /// decoded completion
    pub status: CompletionStatus,
    /// whether any result or status token was found at all
    pub reported: bool,
    /// stdout with the latency prefix stripped
    pub payload: Vec<u8>,
}

/// Parse the output of a transport invocation.
///
/// Fails with [AdminError::TransportFailure] only if the transport exited with
/// a non-zero status and nothing could be parsed out of its output.
pub fn parse_output(output: &TransportOutput) -> Result<ParsedCompletion> {
    let parsed = parse_completion(&output.stdout, &output.stderr);

    if !output.success() && !parsed.reported {
        return Err(AdminError::TransportFailure {
            command_line: output.command_line.clone(),
            exit_code: output.exit_code,
            stderr: output.stderr.clone(),
        });
    }

    Ok(parsed)
}

/// Parse `stdout` and `stderr` of a transport invocation, ignoring the exit status
pub fn parse_completion(stdout: &[u8], stderr: &str) -> ParsedCompletion {
    let mut dwords = CompletionDwords::default();
    let mut reported = false;

    if let Some(value) = result_value(stdout) {
        dwords.dword0 = value;
        reported = true;
    }
    if let Some(value) = success_result(stderr) {
        dwords.dword0 = value;
        reported = true;
    }
    if let Some(word) = status_word(stderr) {
        dwords.dword3 |= (word as u32 & 0x7fff) << STATUS_WORD_SHIFT;
        reported = true;
    }

    let (latency_ms, payload) = match split_latency(stdout) {
        Some((latency_us, rest)) => (Some(latency_us as f64 / 1000.0), rest),
        None => (None, stdout),
    };

    log::debug!("completion dwords {dwords:x?}, latency {latency_ms:?} ms");

    ParsedCompletion {
        status: CompletionStatus::from_dwords(dwords, latency_ms),
        reported,
        payload: payload.to_vec(),
    }
}

fn parse_hex_u32(hex: &str) -> Option<u32> {
    match u32::from_str_radix(hex, 16) {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring result token 0x{hex}, it does not fit into a dword");
            None
        }
    }
}

fn result_value(stdout: &[u8]) -> Option<u32> {
    let caps = RESULT_VALUE.captures_iter(stdout).last()?;
    // the capture only matches ascii hex digits
    let hex = core::str::from_utf8(caps.get(1)?.as_bytes()).ok()?;
    parse_hex_u32(hex)
}

fn success_result(stderr: &str) -> Option<u32> {
    let caps = SUCCESS_RESULT.captures_iter(stderr).last()?;
    parse_hex_u32(caps.get(1)?.as_str())
}

fn status_word(stderr: &str) -> Option<u16> {
    let caps = STATUS_WORD.captures_iter(stderr).last()?;
    let hex = caps.get(1)?.as_str();
    match u16::from_str_radix(hex, 16) {
        Ok(word) => Some(word),
        Err(_) => {
            log::warn!("ignoring status word ({hex}), it does not fit into 16 bits");
            None
        }
    }
}

/// Find the latency marker and return it in microseconds, together with
/// everything after it.
fn split_latency(stdout: &[u8]) -> Option<(u64, &[u8])> {
    let caps = LATENCY.captures(stdout)?;
    let digits = core::str::from_utf8(caps.get(1)?.as_bytes()).ok()?;
    let latency_us = digits.parse().ok()?;
    let end = caps.get(0)?.end();
    Some((latency_us, &stdout[end..]))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::generic_command::{CommandStatusCode, GenericCommandStatus, StatusCodeType};

    fn output(stdout: &[u8], stderr: &str, exit_code: i32) -> TransportOutput {
        TransportOutput {
            command_line: "nvme admin-passthru /dev/nvme0".into(),
            stdout: stdout.to_vec(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
        }
    }

    #[test]
    fn latency_is_stripped_from_payload() {
        let mut stdout = b"admin-passthru: latency: 1500 us\n".to_vec();
        stdout.extend((0..80u8).map(|b| b.wrapping_mul(3)));

        let parsed = parse_completion(&stdout, "");

        assert_eq!(Some(1.5), parsed.status.latency_ms);
        assert_eq!(80, parsed.payload.len());
        assert_eq!(3, parsed.payload[1]);
    }

    #[test]
    fn success_result_takes_precedence() {
        let parsed = parse_completion(
            b"get-feature:0x04 (Temperature Threshold), Current value:0x00000155\n",
            "NVMe Admin command error: Success and result: 0x00000055",
        );
        assert_eq!(0x55, parsed.status.dword0);
        assert!(parsed.status.is_success());
    }

    #[test]
    fn last_value_token_wins() {
        let parsed = parse_completion(b"value:0x1\nvalue:0x00000155\n", "");
        assert_eq!(0x155, parsed.status.dword0);
        assert!(parsed.reported);
        assert_eq!(None, parsed.status.latency_ms);
    }

    #[test]
    fn status_word_is_shifted_into_dword3() {
        let parsed = parse_completion(
            b"",
            "NVMe status: Invalid Field in Command: A reserved coded value or an unsupported value in a defined field(0x4002)",
        );
        let status = parsed.status;
        assert!(status.do_not_retry);
        assert_eq!(StatusCodeType::Generic, status.status_code_type);
        assert_eq!(0x02, status.status_code);
        assert_eq!(
            CommandStatusCode::GenericStatus(GenericCommandStatus::InvalidFieldInCommand),
            status.status()
        );
    }

    #[test]
    fn status_word_without_prefix() {
        let parsed = parse_completion(b"", "NVMe status: Command Specific Status(10b)");
        assert_eq!(StatusCodeType::CommandSpecific, parsed.status.status_code_type);
        assert_eq!(0x0b, parsed.status.status_code);
    }

    #[test]
    fn missing_tokens_are_not_an_error() {
        let parsed = parse_output(&output(b"0000: 00 01", "", 0)).unwrap();
        assert!(!parsed.reported);
        assert_eq!(0, parsed.status.dword0);
        assert!(parsed.status.is_success());
        assert_eq!(b"0000: 00 01", parsed.payload.as_slice());
    }

    #[test]
    fn failure_without_status_is_transport_failure() {
        let result = parse_output(&output(b"", "open: No such file or directory", 1));
        assert!(matches!(
            result,
            Err(AdminError::TransportFailure { exit_code: Some(1), .. })
        ));
    }

    #[test]
    fn failure_with_status_is_parsed() {
        let parsed = parse_output(&output(b"", "NVMe status: Invalid Log Page(0x4109)", 9)).unwrap();
        assert_eq!(StatusCodeType::CommandSpecific, parsed.status.status_code_type);
        assert_eq!(0x09, parsed.status.status_code);
    }

    #[test]
    fn oversized_tokens_are_ignored() {
        let parsed = parse_completion(b"value:0x123456789\n", "(0x123456)");
        assert!(!parsed.reported);
        assert_eq!(0, parsed.status.dword0);
    }
}
