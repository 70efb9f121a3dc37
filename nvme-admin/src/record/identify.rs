use core::ops::Deref;

use bit_field::BitField;
use serde::Serialize;

use super::{record_layout, AsciiString, FieldValue, KeyStyle, RecordMap, U24};
use crate::{AdminError, Result};

record_layout! {
    /// Fixed header of the Identify Namespace data structure, bytes 0 to 127
    ///
    /// See: NVM Express NVM Command Set Spec: Figure 97: Identify Namespace Data Structure
    pub struct IdentifyNamespaceHeader: 4096 {
        /// in logical blocks
        namespace_size / "nsze": u64 = 0,
        /// in logical blocks
        namespace_capacity / "ncap": u64 = 8,
        /// in logical blocks
        namespace_utilization / "nuse": u64 = 16,
        namespace_features / "nsfeat": u8 = 24,
        /// zero based
        number_of_lba_formats / "nlbaf": u8 = 25,
        formatted_lba_size / "flbas": u8 = 26,
        metadata_capabilities / "mc": u8 = 27,
        end_to_end_protection_capabilities / "dpc": u8 = 28,
        end_to_end_protection_settings / "dps": u8 = 29,
        multipath_capabilities / "nmic": u8 = 30,
        reservation_capabilities / "rescap": u8 = 31,
        format_progress_indicator / "fpi": u8 = 32,
        deallocate_features / "dlfeat": u8 = 33,
        atomic_write_unit_normal / "nawun": u16 = 34,
        atomic_write_unit_power_fail / "nawupf": u16 = 36,
        atomic_compare_write_unit / "nacwu": u16 = 38,
        atomic_boundary_size_normal / "nabsn": u16 = 40,
        atomic_boundary_offset / "nabo": u16 = 42,
        atomic_boundary_size_power_fail / "nabspf": u16 = 44,
        optimal_io_boundary / "noiob": u16 = 46,
        /// in bytes
        nvm_capacity / "nvmcap": u128 = 48,
        preferred_write_granularity / "npwg": u16 = 64,
        preferred_write_alignment / "npwa": u16 = 66,
        preferred_deallocate_granularity / "npdg": u16 = 68,
        preferred_deallocate_alignment / "npda": u16 = 70,
        optimal_write_size / "nows": u16 = 72,
        max_single_source_range_length / "mssrl": u16 = 74,
        max_copy_length / "mcl": u32 = 76,
        max_source_range_count / "msrc": u8 = 80,
        unique_capability_lba_formats / "nulbaf": u8 = 81,
        ana_group_id / "anagrpid": u32 = 92,
        namespace_attributes / "nsattr": u8 = 99,
        nvm_set_id / "nvmsetid": u16 = 100,
        endurance_group_id / "endgid": u16 = 102,
    }
}

/// Offset of the first LBA format descriptor
pub const LBA_FORMAT_OFFSET: usize = 128;
/// Size of a single LBA format descriptor
pub const LBA_FORMAT_SIZE: usize = 4;
/// The data structure has room for at most 64 LBA formats
pub const MAX_LBA_FORMATS: usize = 64;

/// A supported logical block size of a namespace
///
/// See: NVM Express NVM Command Set Spec: Figure 98: LBA Format Data Structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LbaFormat {
    /// MS, bytes of metadata per logical block
    pub metadata_size: u16,
    /// LBADS, logical block size as a power of two
    pub lba_data_size_exp: u8,
    /// RP, 0 is best performance
    pub relative_performance: u8,
}

impl LbaFormat {
    /// Decode a single descriptor
    pub fn from_u32(entry: u32) -> Self {
        Self {
            metadata_size: entry.get_bits(0..=15) as u16,
            lba_data_size_exp: entry.get_bits(16..=23) as u8,
            relative_performance: entry.get_bits(24..=25) as u8,
        }
    }

    /// Logical block size in bytes, `None` if the format is not in use
    pub fn lba_data_size(&self) -> Option<u64> {
        match self.lba_data_size_exp {
            0 => None,
            exp @ 1..=63 => Some(1 << exp),
            _ => None,
        }
    }

    /// Flat key value view of the descriptor
    pub fn to_map(&self, style: KeyStyle) -> RecordMap {
        let mut map = RecordMap::with_capacity(3);
        map.push(
            style.pick("metadata_size", "ms"),
            FieldValue::Uint(self.metadata_size as u128),
        );
        map.push(
            style.pick("lba_data_size_exp", "ds"),
            FieldValue::Uint(self.lba_data_size_exp as u128),
        );
        map.push(
            style.pick("relative_performance", "rp"),
            FieldValue::Uint(self.relative_performance as u128),
        );
        map
    }
}

/// Identify Namespace data structure
///
/// Derefs to the [IdentifyNamespaceHeader].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifyNamespaceRecord {
    /// bytes 0 to 127
    #[serde(flatten)]
    pub header: IdentifyNamespaceHeader,
    /// `nlbaf + 1` LBA formats starting at byte 128
    pub lba_formats: Vec<LbaFormat>,
}

impl IdentifyNamespaceRecord {
    /// Size in bytes of the structure
    pub const SIZE: usize = IdentifyNamespaceHeader::SIZE;

    /// Decode from `buf`, which must hold at least [Self::SIZE] bytes
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = IdentifyNamespaceHeader::decode(buf)?;

        let count = header.number_of_lba_formats as usize + 1;
        if count > MAX_LBA_FORMATS {
            return Err(AdminError::MalformedPayload(format!(
                "namespace reports {count} lba formats, at most {MAX_LBA_FORMATS} fit"
            )));
        }

        let lba_formats = buf[LBA_FORMAT_OFFSET..]
            .chunks_exact(LBA_FORMAT_SIZE)
            .take(count)
            .map(|entry| LbaFormat::from_u32(u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]])))
            .collect();

        Ok(Self {
            header,
            lba_formats,
        })
    }

    /// Index of the LBA format the namespace is formatted with
    ///
    /// FLBAS bits 3:0 are the low, bits 6:5 the high part of the index.
    pub fn formatted_lba_index(&self) -> usize {
        let flbas = self.header.formatted_lba_size;
        (flbas.get_bits(0..=3) | flbas.get_bits(5..=6) << 4) as usize
    }

    /// The LBA format the namespace is formatted with
    pub fn active_lba_format(&self) -> Option<&LbaFormat> {
        self.lba_formats.get(self.formatted_lba_index())
    }

    /// Flat key value view, the LBA formats are a nested list under `lba_formats`
    pub fn to_map(&self, style: KeyStyle) -> RecordMap {
        let mut map = self.header.to_map(style);
        map.push(
            style.pick("lba_formats", "lbafs"),
            FieldValue::List(self.lba_formats.iter().map(|f| f.to_map(style)).collect()),
        );
        map
    }
}

impl Deref for IdentifyNamespaceRecord {
    type Target = IdentifyNamespaceHeader;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}

record_layout! {
    /// Identify Controller data structure, the commonly used subset
    ///
    /// See: NVM Express Base Spec: Figure 276: Identify Controller Data Structure
    pub struct IdentifyControllerRecord: 4096 {
        /// PCI vendor id
        vendor_id / "vid": u16 = 0,
        /// PCI subsystem vendor id
        subsystem_vendor_id / "ssvid": u16 = 2,
        serial_number / "sn": AsciiString<20> = 4,
        model_number / "mn": AsciiString<40> = 24,
        firmware_revision / "fr": AsciiString<8> = 64,
        recommended_arbitration_burst / "rab": u8 = 72,
        ieee_oui_identifier / "ieee": U24 = 73,
        multipath_capabilities / "cmic": u8 = 76,
        /// power of two, in units of the minimum memory page size
        maximum_data_transfer_size / "mdts": u8 = 77,
        controller_id / "cntlid": u16 = 78,
        version / "ver": u32 = 80,
        rtd3_resume_latency / "rtd3r": u32 = 84,
        rtd3_entry_latency / "rtd3e": u32 = 88,
        optional_async_events_supported / "oaes": u32 = 92,
        controller_attributes / "ctratt": u32 = 96,
        read_recovery_levels_supported / "rrls": u16 = 100,
        controller_type / "cntrltype": u8 = 111,
        command_retry_delay_time1 / "crdt1": u16 = 128,
        command_retry_delay_time2 / "crdt2": u16 = 130,
        command_retry_delay_time3 / "crdt3": u16 = 132,
        nvm_subsystem_report / "nvmsr": u8 = 253,
        vpd_write_cycle_info / "vwci": u8 = 254,
        management_endpoint_caps / "mec": u8 = 255,
        optional_admin_command_support / "oacs": u16 = 256,
        abort_command_limit / "acl": u8 = 258,
        async_event_request_limit / "aerl": u8 = 259,
        firmware_updates / "frmw": u8 = 260,
        log_page_attributes / "lpa": u8 = 261,
        error_log_page_entries / "elpe": u8 = 262,
        number_of_power_states / "npss": u8 = 263,
        admin_vendor_specific_config / "avscc": u8 = 264,
        autonomous_power_state_attrs / "apsta": u8 = 265,
        /// in Kelvin
        warning_composite_temp_threshold / "wctemp": u16 = 266,
        /// in Kelvin
        critical_composite_temp_threshold / "cctemp": u16 = 268,
        max_firmware_activation_time / "mtfa": u16 = 270,
        host_memory_buffer_preferred_size / "hmpre": u32 = 272,
        host_memory_buffer_min_size / "hmmin": u32 = 276,
        /// in bytes
        total_nvm_capacity / "tnvmcap": u128 = 280,
        /// in bytes
        unallocated_nvm_capacity / "unvmcap": u128 = 296,
        replay_protected_memory_block_support / "rpmbs": u32 = 312,
        extended_device_self_test_time / "edstt": u16 = 316,
        device_self_test_options / "dsto": u8 = 318,
        firmware_update_granularity / "fwug": u8 = 319,
        keep_alive_support / "kas": u16 = 320,
        host_thermal_management_attrs / "hctma": u16 = 322,
        min_thermal_management_temp / "mntmt": u16 = 324,
        max_thermal_management_temp / "mxtmt": u16 = 326,
        sanitize_capabilities / "sanicap": u32 = 328,
        submission_queue_entry_size / "sqes": u8 = 512,
        completion_queue_entry_size / "cqes": u8 = 513,
        max_outstanding_commands / "maxcmd": u16 = 514,
        number_of_namespaces / "nn": u32 = 516,
        optional_nvm_command_support / "oncs": u16 = 520,
        fused_operation_support / "fuses": u16 = 522,
        format_nvm_attributes / "fna": u8 = 524,
        volatile_write_cache / "vwc": u8 = 525,
        atomic_write_unit_normal / "awun": u16 = 526,
        atomic_write_unit_power_fail / "awupf": u16 = 528,
        io_command_set_vendor_specific_config / "icsvscc": u8 = 530,
        namespace_write_protection_caps / "nwpc": u8 = 531,
        atomic_compare_write_unit / "acwu": u16 = 532,
        sgl_support / "sgls": u32 = 536,
        max_allowed_namespaces / "mnan": u32 = 540,
        nvm_subsystem_nqn / "subnqn": AsciiString<256> = 768,
    }
}

impl IdentifyControllerRecord {
    /// `(major, minor, tertiary)` of the NVMe version the controller implements
    pub fn nvme_version(&self) -> (u16, u8, u8) {
        (
            self.version.get_bits(16..=31) as u16,
            self.version.get_bits(8..=15) as u8,
            self.version.get_bits(0..=7) as u8,
        )
    }
}
