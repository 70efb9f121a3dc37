use bitflags::bitflags;

use super::record_layout;

record_layout! {
    /// SMART / Health Information log page
    ///
    /// The 16 byte counters are kept as `u128`.
    ///
    /// See: NVM Express Base Spec: Figure 207: SMART / Health Information Log Page
    pub struct SmartLogRecord: 512 {
        critical_warning / "cw": u8 = 0,
        /// in Kelvin
        composite_temperature / "ctemp": u16 = 1,
        /// percentage
        available_spare / "avsp": u8 = 3,
        /// percentage
        available_spare_threshold / "avspt": u8 = 4,
        percentage_used / "pused": u8 = 5,
        /// thousands of 512 byte units
        data_units_read / "dur": u128 = 32,
        /// thousands of 512 byte units
        data_units_written / "duw": u128 = 48,
        host_read_commands / "hrc": u128 = 64,
        host_write_commands / "hwc": u128 = 80,
        /// minutes
        controller_busy_time / "cbt": u128 = 96,
        power_cycles / "pwrc": u128 = 112,
        power_on_hours / "poh": u128 = 128,
        unsafe_shutdowns / "upl": u128 = 144,
        media_errors / "mdie": u128 = 160,
        num_error_log_entries / "neile": u128 = 176,
    }
}

bitflags! {
    /// Critical warnings of a [SmartLogRecord]
    ///
    /// See: NVM Express Base Spec: Figure 207: Critical Warning
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CriticalWarning: u8 {
        /// available spare dropped below the threshold
        const SPARE_BELOW_THRESHOLD = 1;
        /// a temperature is outside its threshold
        const TEMPERATURE = 1 << 1;
        /// NVM subsystem reliability is degraded
        const RELIABILITY_DEGRADED = 1 << 2;
        /// all media is read only
        const READ_ONLY = 1 << 3;
        /// volatile memory backup failed
        const VOLATILE_BACKUP_FAILED = 1 << 4;
        /// persistent memory region became read only
        const PMR_READ_ONLY = 1 << 5;

        const _ = !0;
    }
}

impl SmartLogRecord {
    /// [Self::critical_warning] as flags
    pub fn critical_warnings(&self) -> CriticalWarning {
        CriticalWarning::from_bits_retain(self.critical_warning)
    }

    /// Composite temperature in degree Celsius
    pub fn temperature_celsius(&self) -> i32 {
        self.composite_temperature as i32 - 273
    }
}
