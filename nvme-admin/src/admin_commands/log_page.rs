use bit_field::BitField;
use shared_derive::U8Enum;

use crate::{
    generic_command::{AdminCommand, CommandOpcode, NSID_BROADCAST},
    AdminError, Result,
};

/// Log page identifiers
///
/// See: NVM Express Base Spec: Figure 202: Get Log Page - Log Page Identifiers
#[allow(missing_docs)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, U8Enum)]
#[non_exhaustive]
pub enum LogPageIdentifier {
    SupportedLogPages = 0x0,
    ErrorInformation = 0x1,
    SmartHealthInformation = 0x2,
    FirmwareSlotInformation = 0x3,
    ChangedNamespaceList = 0x4,
    CommandsSupportedAndEffects = 0x5,
    DeviceSelfTest = 0x6,
    TelemetryHostInitiated = 0x7,
    TelemetryControllerInitiated = 0x8,
}

/// Size of the SMART / Health Information log page
pub const SMART_LOG_SIZE: u32 = 512;

/// Create the [AdminCommand] for a get log page command
///
/// `log_length_bytes` must be a positive multiple of 4. The zero based dword
/// count is split into NUMDL (CDW10 bits 31:16) and NUMDU (CDW11 bits 15:0),
/// CDW11 is only set if NUMDU is not 0.
///
/// See: NVM Express Base Spec: 5.16
pub fn create_get_log_page_command(
    log_page_id: u8,
    namespace_id: u32,
    log_length_bytes: u32,
) -> Result<AdminCommand> {
    if log_length_bytes == 0 || log_length_bytes % 4 != 0 {
        return Err(AdminError::invalid(
            "log length",
            format!("{log_length_bytes} is not a positive multiple of 4"),
        ));
    }
    let number_of_dwords = log_length_bytes / 4 - 1;

    let mut dword10: u32 = 0;
    dword10.set_bits(0..=7, log_page_id as u32);
    dword10.set_bits(16..=31, number_of_dwords.get_bits(0..=15));

    let numdu = number_of_dwords.get_bits(16..=31);

    let mut builder = AdminCommand::builder(CommandOpcode::GetLogPage.into())
        .namespace_id(namespace_id)
        .read(log_length_bytes)
        .cdw(10, dword10);
    if numdu != 0 {
        let mut dword11: u32 = 0;
        dword11.set_bits(0..=15, numdu);
        builder = builder.cdw(11, dword11);
    }

    Ok(builder.build())
}

/// Create the get log page command for the controller wide SMART / Health log
pub fn create_smart_log_command() -> Result<AdminCommand> {
    create_get_log_page_command(
        LogPageIdentifier::SmartHealthInformation.into(),
        NSID_BROADCAST,
        SMART_LOG_SIZE,
    )
}

/// Recover `(log_page_id, log_length_bytes)` from the dwords of a get log page command
pub fn decode_get_log_page_dwords(dword10: u32, dword11: Option<u32>) -> (u8, u32) {
    let log_page_id = dword10.get_bits(0..=7) as u8;
    let mut number_of_dwords = dword10.get_bits(16..=31);
    if let Some(dword11) = dword11 {
        number_of_dwords.set_bits(16..=31, dword11.get_bits(0..=15));
    }
    (log_page_id, (number_of_dwords + 1) * 4)
}
