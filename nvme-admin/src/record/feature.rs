use bit_field::BitField;
use serde::Serialize;

use super::{FieldValue, KeyStyle, RecordMap};
use crate::admin_commands::FeatureIdentifier;

/// Decoded completion dword 0 of a get features command
///
/// See: NVM Express Base Spec: 5.27.1 Feature Specific Information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "feature", rename_all = "snake_case")]
pub enum FeatureValue {
    /// Power Management (0x02)
    PowerManagement {
        /// PS, bits 4:0
        power_state: u8,
        /// WH, bits 7:5
        workload_hint: u8,
    },
    /// Temperature Threshold (0x04)
    TemperatureThreshold {
        /// TMPTH in Kelvin, bits 15:0
        temp_threshold: u16,
        /// TMPSEL, bits 19:16
        threshold_sensor_select: u8,
        /// THSEL, bits 21:20. 0 is over, 1 is under temperature
        threshold_type_select: u8,
        /// TMPTHH, bits 24:22
        hysteresis: u8,
    },
    /// Volatile Write Cache (0x06)
    VolatileWriteCache {
        /// WCE, bit 0
        enabled: bool,
    },
    /// Number of Queues (0x07), both counts are zero based
    NumberOfQueues {
        /// NSQA, bits 15:0
        submission_queues: u16,
        /// NCQA, bits 31:16
        completion_queues: u16,
    },
    /// Any feature without a decoder
    Unknown {
        /// the feature identifier
        feature_id: u8,
        /// dword 0 as returned by the controller
        raw_dword0: u32,
    },
}

impl FeatureValue {
    /// Decode `dword0` as the value of `feature_id`
    pub fn decode(feature_id: u8, dword0: u32) -> Self {
        let Ok(known) = FeatureIdentifier::try_from(feature_id) else {
            return FeatureValue::Unknown {
                feature_id,
                raw_dword0: dword0,
            };
        };

        match known {
            FeatureIdentifier::PowerManagement => FeatureValue::PowerManagement {
                power_state: dword0.get_bits(0..=4) as u8,
                workload_hint: dword0.get_bits(5..=7) as u8,
            },
            FeatureIdentifier::TemperatureThreshold => FeatureValue::TemperatureThreshold {
                temp_threshold: dword0.get_bits(0..=15) as u16,
                threshold_sensor_select: dword0.get_bits(16..=19) as u8,
                threshold_type_select: dword0.get_bits(20..=21) as u8,
                hysteresis: dword0.get_bits(22..=24) as u8,
            },
            FeatureIdentifier::VolatileWriteCache => FeatureValue::VolatileWriteCache {
                enabled: dword0.get_bit(0),
            },
            FeatureIdentifier::NumberOfQueues => FeatureValue::NumberOfQueues {
                submission_queues: dword0.get_bits(0..=15) as u16,
                completion_queues: dword0.get_bits(16..=31) as u16,
            },
            FeatureIdentifier::Arbitration
            | FeatureIdentifier::LbaRangeType
            | FeatureIdentifier::ErrorRecovery
            | FeatureIdentifier::InterruptCoalescing
            | FeatureIdentifier::InterruptVectorConfiguration
            | FeatureIdentifier::WriteAtomicityNormal
            | FeatureIdentifier::AsynchronousEventConfiguration
            | FeatureIdentifier::AutonomousPowerStateTransition
            | FeatureIdentifier::HostMemoryBuffer
            | FeatureIdentifier::Timestamp
            | FeatureIdentifier::KeepAliveTimer
            | FeatureIdentifier::IOCommandSet => FeatureValue::Unknown {
                feature_id,
                raw_dword0: dword0,
            },
        }
    }

    /// The feature identifier this value belongs to
    pub fn feature_id(&self) -> u8 {
        match self {
            FeatureValue::PowerManagement { .. } => FeatureIdentifier::PowerManagement.into(),
            FeatureValue::TemperatureThreshold { .. } => {
                FeatureIdentifier::TemperatureThreshold.into()
            }
            FeatureValue::VolatileWriteCache { .. } => FeatureIdentifier::VolatileWriteCache.into(),
            FeatureValue::NumberOfQueues { .. } => FeatureIdentifier::NumberOfQueues.into(),
            FeatureValue::Unknown { feature_id, .. } => *feature_id,
        }
    }

    /// Encode the value as CDW11 of a set features command
    ///
    /// Every field is masked to its bit width.
    pub fn encode_dword11(&self) -> u32 {
        let mut dword: u32 = 0;
        match *self {
            FeatureValue::PowerManagement {
                power_state,
                workload_hint,
            } => {
                dword.set_bits(0..=4, power_state as u32 & 0x1f);
                dword.set_bits(5..=7, workload_hint as u32 & 0x7);
            }
            FeatureValue::TemperatureThreshold {
                temp_threshold,
                threshold_sensor_select,
                threshold_type_select,
                hysteresis,
            } => {
                dword.set_bits(0..=15, temp_threshold as u32);
                dword.set_bits(16..=19, threshold_sensor_select as u32 & 0xf);
                dword.set_bits(20..=21, threshold_type_select as u32 & 0x3);
                dword.set_bits(22..=24, hysteresis as u32 & 0x7);
            }
            FeatureValue::VolatileWriteCache { enabled } => {
                dword.set_bit(0, enabled);
            }
            FeatureValue::NumberOfQueues {
                submission_queues,
                completion_queues,
            } => {
                dword.set_bits(0..=15, submission_queues as u32);
                dword.set_bits(16..=31, completion_queues as u32);
            }
            FeatureValue::Unknown { raw_dword0, .. } => dword = raw_dword0,
        }
        dword
    }

    /// Flat key value view of the value
    pub fn to_map(&self, style: KeyStyle) -> RecordMap {
        let mut map = RecordMap::with_capacity(4);
        let uint = |v: u32| FieldValue::Uint(v as u128);
        match *self {
            FeatureValue::PowerManagement {
                power_state,
                workload_hint,
            } => {
                map.push(style.pick("power_state", "ps"), uint(power_state as u32));
                map.push(style.pick("workload_hint", "wh"), uint(workload_hint as u32));
            }
            FeatureValue::TemperatureThreshold {
                temp_threshold,
                threshold_sensor_select,
                threshold_type_select,
                hysteresis,
            } => {
                map.push(style.pick("temp_threshold", "tmpth"), uint(temp_threshold as u32));
                map.push(
                    style.pick("threshold_sensor_select", "tmpsel"),
                    uint(threshold_sensor_select as u32),
                );
                map.push(
                    style.pick("threshold_type_select", "thsel"),
                    uint(threshold_type_select as u32),
                );
                map.push(style.pick("hysteresis", "tmpthh"), uint(hysteresis as u32));
            }
            FeatureValue::VolatileWriteCache { enabled } => {
                map.push(style.pick("enabled", "wce"), FieldValue::Bool(enabled));
            }
            FeatureValue::NumberOfQueues {
                submission_queues,
                completion_queues,
            } => {
                map.push(
                    style.pick("submission_queues", "nsqa"),
                    uint(submission_queues as u32),
                );
                map.push(
                    style.pick("completion_queues", "ncqa"),
                    uint(completion_queues as u32),
                );
            }
            FeatureValue::Unknown {
                feature_id,
                raw_dword0,
            } => {
                map.push(style.pick("feature_id", "fid"), uint(feature_id as u32));
                map.push(
                    style.pick("raw_dword0", "dw0"),
                    FieldValue::Text(format!("{raw_dword0:#010x}")),
                );
            }
        }
        map
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn temperature_threshold() {
        let value = FeatureValue::decode(0x04, 0x155);
        assert_eq!(
            FeatureValue::TemperatureThreshold {
                temp_threshold: 341,
                threshold_sensor_select: 0,
                threshold_type_select: 0,
                hysteresis: 0,
            },
            value
        );
        assert_eq!(0x04, value.feature_id());

        let map = value.to_map(KeyStyle::Short);
        assert_eq!(Some(341), map.get("tmpth").and_then(|v| v.as_uint()));
        assert_eq!(Some(0), map.get("thsel").and_then(|v| v.as_uint()));
    }

    #[test]
    fn temperature_threshold_all_fields() {
        // tmpthh=5 thsel=1 tmpsel=0xa tmpth=0x15e
        let dword0 = 5 << 22 | 1 << 20 | 0xa << 16 | 0x15e;
        let value = FeatureValue::decode(0x04, dword0);
        assert_eq!(
            FeatureValue::TemperatureThreshold {
                temp_threshold: 0x15e,
                threshold_sensor_select: 0xa,
                threshold_type_select: 1,
                hysteresis: 5,
            },
            value
        );
        assert_eq!(dword0, value.encode_dword11());
    }

    #[test]
    fn queues_and_cache() {
        assert_eq!(
            FeatureValue::NumberOfQueues {
                submission_queues: 0x3f,
                completion_queues: 0x1f,
            },
            FeatureValue::decode(0x07, 0x001f_003f)
        );
        assert_eq!(
            FeatureValue::VolatileWriteCache { enabled: true },
            FeatureValue::decode(0x06, 0xffff_ff01)
        );
        assert_eq!(
            FeatureValue::PowerManagement {
                power_state: 3,
                workload_hint: 2,
            },
            FeatureValue::decode(0x02, 0x43)
        );
    }

    #[test]
    fn unknown_feature_keeps_raw_value() {
        let value = FeatureValue::decode(0x0e, 0xdead_beef);
        assert_eq!(
            FeatureValue::Unknown {
                feature_id: 0x0e,
                raw_dword0: 0xdead_beef
            },
            value
        );
        assert_eq!(
            Some(&FieldValue::Text("0xdeadbeef".into())),
            value.to_map(KeyStyle::Long).get("raw_dword0")
        );
        assert_eq!(0xdead_beef, value.encode_dword11());

        assert_eq!(0xc1, FeatureValue::decode(0xc1, 0).feature_id());
    }

    #[test]
    fn encode_masks_fields() {
        let value = FeatureValue::PowerManagement {
            power_state: 0xff,
            workload_hint: 0,
        };
        assert_eq!(0x1f, value.encode_dword11());
    }

    #[test]
    fn serializes_with_tag() {
        let json = serde_json::to_value(FeatureValue::decode(0x06, 0)).unwrap();
        assert_eq!("volatile_write_cache", json["feature"]);
        assert_eq!(false, json["enabled"]);
    }
}
