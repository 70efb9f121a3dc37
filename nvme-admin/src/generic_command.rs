//! Data shared between all admin commands
//!
//! An [AdminCommand] is what gets handed to a [Transport](crate::Transport),
//! a [CompletionStatus] is what gets decoded from its result.

use core::fmt;

use bit_field::BitField;
use serde::Serialize;
use shared_derive::U8Enum;
use thiserror::Error;

use crate::{AdminError, Result};

/// Namespace identifier that addresses the controller instead of a namespace
pub const NSID_BROADCAST: u32 = 0xffff_ffff;

/// Opcodes of the admin commands this crate knows how to encode
///
/// Raw passthrough through [AdminCommandBuilder] accepts any opcode.
///
/// See: NVM Express Base Spec: Figure 84: Opcodes for Admin Commands
#[allow(missing_docs)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, U8Enum)]
pub enum CommandOpcode {
    GetLogPage = 0x02,
    Identify = 0x06,
    SetFeatures = 0x09,
    GetFeatures = 0x0a,
}

/// Data transfer direction of a command, seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// controller to host
    Read,
    /// host to controller
    Write,
    /// no data transfer
    None,
}

/// Index of the first command specific dword
pub const FIRST_COMMAND_DWORD: usize = 10;

/// An admin command ready to be handed to a transport
///
/// Built by the functions in [admin_commands](crate::admin_commands) or by
/// [AdminCommandBuilder] for raw passthrough. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCommand {
    opcode: u8,
    namespace_id: u32,
    data_length: u32,
    direction: Direction,
    /// CDW10 to CDW15
    dwords: [Option<u32>; 6],
    write_data: Option<Vec<u8>>,
}

impl AdminCommand {
    /// Start building a raw command with the given `opcode`
    pub fn builder(opcode: u8) -> AdminCommandBuilder {
        AdminCommandBuilder {
            command: AdminCommand {
                opcode,
                namespace_id: 0,
                data_length: 0,
                direction: Direction::None,
                dwords: [None; 6],
                write_data: None,
            },
        }
    }

    /// the raw opcode
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// NSID, `0` addresses the whole controller for commands that support it
    pub fn namespace_id(&self) -> u32 {
        self.namespace_id
    }

    /// length of the data buffer in bytes
    pub fn data_length(&self) -> u32 {
        self.data_length
    }

    /// direction of the data transfer
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Command dword `index`.
    ///
    /// Only 10 to 15 are command specific, every other index is `None`.
    pub fn cdw(&self, index: usize) -> Option<u32> {
        index
            .checked_sub(FIRST_COMMAND_DWORD)
            .and_then(|i| self.dwords.get(i).copied().flatten())
    }

    /// All set command dwords as `(index, value)` pairs in ascending order
    pub fn dwords(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.dwords
            .iter()
            .enumerate()
            .filter_map(|(i, dw)| dw.map(|dw| (i + FIRST_COMMAND_DWORD, dw)))
    }

    /// data sent to the controller for [Direction::Write] commands
    pub fn write_data(&self) -> Option<&[u8]> {
        self.write_data.as_deref()
    }
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opcode = CommandOpcode::try_from(self.opcode)
            .map(|op| format!("{op:?}"))
            .unwrap_or_else(|_| "Unknown".into());
        write!(
            f,
            "{opcode}(opcode={:#04x}, nsid={:#x}, data_len={}, {:?}",
            self.opcode, self.namespace_id, self.data_length, self.direction
        )?;
        for (index, dword) in self.dwords() {
            write!(f, ", cdw{index}={dword:#010x}")?;
        }
        write!(f, ")")
    }
}

/// Builder for [AdminCommand]
#[derive(Debug, Clone)]
pub struct AdminCommandBuilder {
    command: AdminCommand,
}

impl AdminCommandBuilder {
    /// set the NSID
    pub fn namespace_id(mut self, nsid: u32) -> Self {
        self.command.namespace_id = nsid;
        self
    }

    /// expect `length` bytes to be read from the controller
    pub fn read(mut self, length: u32) -> Self {
        self.command.direction = Direction::Read;
        self.command.data_length = length;
        self.command.write_data = None;
        self
    }

    /// send `data` to the controller
    ///
    /// fails if the length of `data` does not fit into a `u32`
    pub fn write(mut self, data: Vec<u8>) -> Result<Self> {
        let length = u32::try_from(data.len()).map_err(|_| {
            AdminError::invalid("write data", format!("{} bytes exceed u32", data.len()))
        })?;
        self.command.direction = Direction::Write;
        self.command.data_length = length;
        self.command.write_data = Some(data);
        Ok(self)
    }

    /// Set command dword `index`.
    ///
    /// # Panics
    ///
    /// if `index` is not within 10 to 15
    #[track_caller]
    pub fn cdw(mut self, index: usize, value: u32) -> Self {
        assert!(
            (FIRST_COMMAND_DWORD..FIRST_COMMAND_DWORD + 6).contains(&index),
            "cdw{index} is not a command specific dword"
        );
        self.command.dwords[index - FIRST_COMMAND_DWORD] = Some(value);
        self
    }

    /// finish building
    pub fn build(self) -> AdminCommand {
        self.command
    }
}

/// The four dwords of a completion queue entry as reported by the transport
///
/// See: NVM Express Base Spec: Figure 90: Common Completion Queue Entry Layout
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionDwords {
    pub dword0: u32,
    pub dword1: u32,
    pub dword2: u32,
    pub dword3: u32,
}

/// Bit positions within completion dword 3.
///
/// See: NVM Express Base Spec: Figure 93: Completion Queue Entry: Status Field
// The status field is bits 31:17, the command identifier 15:0. The phase tag
// sits in between at bit 16.
pub mod dword3 {
    use core::ops::RangeInclusive;

    /// DNR
    pub const DO_NOT_RETRY_BIT: usize = 31;
    /// M
    pub const MORE_BIT: usize = 30;
    /// CRD
    pub const COMMAND_RETRY_DELAY_BITS: RangeInclusive<usize> = 28..=29;
    /// SCT
    pub const STATUS_CODE_TYPE_BITS: RangeInclusive<usize> = 25..=27;
    /// SC
    pub const STATUS_CODE_BITS: RangeInclusive<usize> = 17..=24;
    /// P
    pub const PHASE_TAG_BIT: usize = 16;
    /// CID
    pub const COMMAND_ID_BITS: RangeInclusive<usize> = 0..=15;

    /// Shift that moves a 15 bit status word (as printed by nvme-cli) into dword 3
    pub const STATUS_WORD_SHIFT: usize = 17;
}

/// Status Code Type of a completion
///
/// See: NVM Express Base Spec: Figure 94: Status Code Type Values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusCodeType {
    /// SCT 0
    Generic,
    /// SCT 1
    CommandSpecific,
    /// SCT 2
    MediaIntegrity,
    /// SCT 3
    PathRelated,
    /// SCT 4 to 6
    Reserved(u8),
    /// SCT 7
    VendorSpecific,
}

impl StatusCodeType {
    /// Interpret the low 3 bits of `value`
    pub fn from_bits(value: u8) -> Self {
        match value & 0x7 {
            0 => StatusCodeType::Generic,
            1 => StatusCodeType::CommandSpecific,
            2 => StatusCodeType::MediaIntegrity,
            3 => StatusCodeType::PathRelated,
            7 => StatusCodeType::VendorSpecific,
            reserved => StatusCodeType::Reserved(reserved),
        }
    }

    /// the raw 3 bit value
    pub fn bits(self) -> u8 {
        match self {
            StatusCodeType::Generic => 0,
            StatusCodeType::CommandSpecific => 1,
            StatusCodeType::MediaIntegrity => 2,
            StatusCodeType::PathRelated => 3,
            StatusCodeType::Reserved(v) => v,
            StatusCodeType::VendorSpecific => 7,
        }
    }
}

/// Completion status of a single admin command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionStatus {
    /// command specific result
    pub dword0: u32,
    /// SQHD
    pub sq_head_pointer: u16,
    /// SQID
    pub sq_id: u16,
    /// DNR
    pub do_not_retry: bool,
    /// M
    pub more: bool,
    /// CRD, 2 bits
    pub command_retry_delay: u8,
    /// SCT
    pub status_code_type: StatusCodeType,
    /// SC
    pub status_code: u8,
    /// P
    pub phase_tag: bool,
    /// CID
    pub command_id: u16,
    /// latency reported by the transport
    pub latency_ms: Option<f64>,
}

impl CompletionStatus {
    /// Decode the strongly typed fields out of the raw completion dwords
    pub fn from_dwords(dwords: CompletionDwords, latency_ms: Option<f64>) -> Self {
        use self::dword3::*;

        let dw3 = dwords.dword3;
        Self {
            dword0: dwords.dword0,
            sq_head_pointer: dwords.dword2.get_bits(0..=15) as u16,
            sq_id: dwords.dword2.get_bits(16..=31) as u16,
            do_not_retry: dw3.get_bit(DO_NOT_RETRY_BIT),
            more: dw3.get_bit(MORE_BIT),
            command_retry_delay: dw3.get_bits(COMMAND_RETRY_DELAY_BITS) as u8,
            status_code_type: StatusCodeType::from_bits(dw3.get_bits(STATUS_CODE_TYPE_BITS) as u8),
            status_code: dw3.get_bits(STATUS_CODE_BITS) as u8,
            phase_tag: dw3.get_bit(PHASE_TAG_BIT),
            command_id: dw3.get_bits(COMMAND_ID_BITS) as u16,
            latency_ms,
        }
    }

    /// Interpretation of the status code type and status code
    pub fn status(&self) -> CommandStatusCode {
        match self.status_code_type {
            StatusCodeType::Generic => {
                if let Ok(status) = GenericCommandStatus::try_from(self.status_code) {
                    CommandStatusCode::GenericStatus(status)
                } else {
                    CommandStatusCode::UnknownGenericStatus(self.status_code)
                }
            }
            StatusCodeType::CommandSpecific => {
                CommandStatusCode::CommandSpecificStatus(self.status_code)
            }
            StatusCodeType::MediaIntegrity => {
                CommandStatusCode::MediaAndDataIntegrityError(self.status_code)
            }
            StatusCodeType::PathRelated => CommandStatusCode::PathRelatedStatus(self.status_code),
            StatusCodeType::Reserved(typ) => CommandStatusCode::Reserved {
                typ,
                status: self.status_code,
            },
            StatusCodeType::VendorSpecific => CommandStatusCode::VendorSpecific(self.status_code),
        }
    }

    /// returns `true` if the completion does not represent any type of error
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }
}

/// Interpretation of the (SCT, SC) pair of a [CompletionStatus]
///
/// See: NVM Express Base Spec: Figure 94: Status Code Type Values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandStatusCode {
    /// a named generic status
    #[error("{0:?}")]
    GenericStatus(GenericCommandStatus),
    /// generic status without a name, e.g. from the I/O command set
    #[error("generic status {0:#04x}")]
    UnknownGenericStatus(u8),
    /// status specific to the issued command, e.g. Invalid Log Page
    #[error("command specific status {0:#04x}")]
    CommandSpecificStatus(u8),
    /// media or data integrity error
    #[error("media error {0:#04x}")]
    MediaAndDataIntegrityError(u8),
    /// path related status
    #[error("path related status {0:#04x}")]
    PathRelatedStatus(u8),
    /// status with a reserved status code type
    #[error("status {status:#04x} of reserved type {typ}")]
    Reserved {
        /// SCT
        typ: u8,
        /// SC
        status: u8,
    },
    /// vendor specific status
    #[error("vendor specific status {0:#04x}")]
    VendorSpecific(u8),
}

impl CommandStatusCode {
    /// `true` only for [GenericCommandStatus::Success]
    #[inline]
    pub fn is_success(self) -> bool {
        self == CommandStatusCode::GenericStatus(GenericCommandStatus::Success)
    }
}

/// Generic status values of a [CompletionStatus]
///
/// See: NVM Express Base Spec: Figure 95: Generic Command Status Values
#[allow(missing_docs)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, U8Enum)]
pub enum GenericCommandStatus {
    Success = 0,
    InvalidCommandOpcode = 1,
    InvalidFieldInCommand = 2,
    CommandIdConflict = 3,
    DataTransferError = 4,
    CommandAbortedPowerLoss = 5,
    InternalError = 6,
    AbortRequested = 7,
    AbortSQDeletion = 8,
    AbortFailedFuse = 9,
    AbortMissingFuse = 0xa,
    InvalidNamespaceFormat = 0xb,
    SequenceError = 0xc,
    InvalidSgl = 0xd,
    InvalidSglCount = 0xe,
    InvalidSglLength = 0xf,
    InvalidMetadataSglLength = 0x10,
    InvalidSglType = 0x11,
    InvalidUseOfControllerMemBuf = 0x12,
    InvalidPrpOffset = 0x13,
    AtomicWriteExceeded = 0x14,
    OperationDenied = 0x15,
    InvalidSglOffset = 0x16,
    // reserved 0x17
    HostIdInconsistentFormat = 0x18,
    KeepAliveExpired = 0x19,
    InvalidKeepAliveTimeout = 0x1a,
    AbortDueToPreemptAbort = 0x1b,
    SanitizeFailed = 0x1c,
    SanitizeInProgress = 0x1d,
    InvalidSglBlockGranularity = 0x1e,
    NotSupportedForQueueInCMB = 0x1f,
    NamespaceWriteProtected = 0x20,
    Interrupted = 0x21,
    TransientTransportError = 0x22,
    ProhibitedByLockdown = 0x23,
    AdminCommandMediaNotReady = 0x24,
    // 0x80 .. 0xbf belong to the I/O command sets
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_dword3_fields() {
        // DNR | M | CRD=2 | SCT=1 | SC=0x0b | P | CID=0x1234
        let dword3 = (1 << 31) | (1 << 30) | (2 << 28) | (1 << 25) | (0x0b << 17) | (1 << 16) | 0x1234;
        let status = CompletionStatus::from_dwords(
            CompletionDwords {
                dword0: 0xdead,
                dword1: 0,
                dword2: 0x0003_0007,
                dword3,
            },
            None,
        );

        assert_eq!(0xdead, status.dword0);
        assert_eq!(7, status.sq_head_pointer);
        assert_eq!(3, status.sq_id);
        assert!(status.do_not_retry);
        assert!(status.more);
        assert_eq!(2, status.command_retry_delay);
        assert_eq!(StatusCodeType::CommandSpecific, status.status_code_type);
        assert_eq!(0x0b, status.status_code);
        assert!(status.phase_tag);
        assert_eq!(0x1234, status.command_id);
        assert_eq!(CommandStatusCode::CommandSpecificStatus(0x0b), status.status());
        assert!(!status.is_success());
    }

    #[test]
    fn write_sets_data_length() {
        let command = AdminCommand::builder(0x09)
            .write(vec![0; 12])
            .unwrap()
            .build();
        assert_eq!(Direction::Write, command.direction());
        assert_eq!(12, command.data_length());
        assert_eq!(Some(&[0u8; 12][..]), command.write_data());
    }

    #[test]
    fn zero_dwords_are_success() {
        let status = CompletionStatus::from_dwords(CompletionDwords::default(), Some(0.5));
        assert!(status.is_success());
        assert_eq!(Some(0.5), status.latency_ms);
    }

    #[test]
    fn generic_status_lookup() {
        let status = CompletionStatus::from_dwords(
            CompletionDwords {
                dword3: 0x02 << 17,
                ..Default::default()
            },
            None,
        );
        assert_eq!(
            CommandStatusCode::GenericStatus(GenericCommandStatus::InvalidFieldInCommand),
            status.status()
        );

        let status = CompletionStatus::from_dwords(
            CompletionDwords {
                dword3: 0x17 << 17,
                ..Default::default()
            },
            None,
        );
        assert_eq!(CommandStatusCode::UnknownGenericStatus(0x17), status.status());
    }

    #[test]
    fn reserved_status_code_type() {
        assert_eq!(StatusCodeType::Reserved(5), StatusCodeType::from_bits(5));
        assert_eq!(5, StatusCodeType::from_bits(5).bits());
        assert_eq!(StatusCodeType::VendorSpecific, StatusCodeType::from_bits(0xf));
    }

    #[test]
    fn builder_dwords() {
        let command = AdminCommand::builder(CommandOpcode::GetFeatures.into())
            .cdw(10, 4)
            .cdw(15, 0xff)
            .build();

        assert_eq!(Some(4), command.cdw(10));
        assert_eq!(None, command.cdw(11));
        assert_eq!(Some(0xff), command.cdw(15));
        assert_eq!(None, command.cdw(9));
        assert_eq!(None, command.cdw(16));
        assert_eq!(vec![(10, 4), (15, 0xff)], command.dwords().collect::<Vec<_>>());
        assert_eq!(Direction::None, command.direction());
    }

    #[test]
    #[should_panic]
    fn builder_rejects_non_command_dword() {
        let _ = AdminCommand::builder(0).cdw(9, 0);
    }

    #[test]
    fn opcode_round_trip() {
        assert_eq!(Ok(CommandOpcode::Identify), CommandOpcode::try_from(6));
        assert!(CommandOpcode::try_from(0x3).is_err());
        assert_eq!(0x0a, u8::from(CommandOpcode::GetFeatures));
    }
}
