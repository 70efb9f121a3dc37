use bit_field::BitField;
use shared_derive::U8Enum;

use crate::{
    generic_command::{AdminCommand, CommandOpcode},
    AdminError, Result,
};

/// See: NVM Express Base Spec: Figure 317: Feature Identifiers
#[allow(missing_docs)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, U8Enum)]
#[non_exhaustive]
pub enum FeatureIdentifier {
    Arbitration = 0x1,
    PowerManagement = 0x2,
    LbaRangeType = 0x3,
    TemperatureThreshold = 0x4,
    ErrorRecovery = 0x5,
    VolatileWriteCache = 0x6,
    NumberOfQueues = 0x7,
    InterruptCoalescing = 0x8,
    InterruptVectorConfiguration = 0x9,
    WriteAtomicityNormal = 0xa,
    AsynchronousEventConfiguration = 0xb,
    AutonomousPowerStateTransition = 0xc,
    HostMemoryBuffer = 0xd,
    Timestamp = 0xe,
    KeepAliveTimer = 0xf,
    IOCommandSet = 0x19,
}

/// Which value a get features command reports
///
/// See: NVM Express Base Spec: Figure 197: Get Features - Select
#[allow(missing_docs)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, U8Enum)]
pub enum FeatureSelect {
    Current = 0x0,
    Default = 0x1,
    Saved = 0x2,
    SupportedCapabilities = 0x3,
}

impl FeatureSelect {
    /// Create from the raw 2 bit select value
    pub fn from_raw(select: u8) -> Result<Self> {
        Self::try_from(select).map_err(|invalid| {
            AdminError::invalid("select", format!("{:#x} is out of range", invalid.value))
        })
    }
}

fn check_feature_id(feature_id: u8) -> Result<()> {
    if feature_id == 0 {
        return Err(AdminError::invalid("feature id", "0 is reserved"));
    }
    Ok(())
}

/// Create the [AdminCommand] for a get features command
///
/// See: NVM Express Base Spec: 5.15
pub fn create_get_features_command(
    feature_id: u8,
    select: FeatureSelect,
    namespace_id: u32,
) -> Result<AdminCommand> {
    check_feature_id(feature_id)?;

    let mut dword10: u32 = 0;
    dword10.set_bits(0..=7, feature_id as u32);
    dword10.set_bits(8..=10, u8::from(select) as u32);

    Ok(AdminCommand::builder(CommandOpcode::GetFeatures.into())
        .namespace_id(namespace_id)
        .read(0)
        .cdw(10, dword10)
        .build())
}

/// Create the [AdminCommand] for a set features command
///
/// `value` goes into CDW11 unchanged. A `namespace_id` of 0 sets the feature
/// controller wide.
///
/// See: NVM Express Base Spec: 5.27
pub fn create_set_features_command(
    feature_id: u8,
    value: u32,
    save: bool,
    namespace_id: u32,
) -> Result<AdminCommand> {
    check_feature_id(feature_id)?;

    let mut dword10: u32 = 0;
    dword10.set_bits(0..=7, feature_id as u32);
    dword10.set_bit(31, save);

    Ok(AdminCommand::builder(CommandOpcode::SetFeatures.into())
        .namespace_id(namespace_id)
        .cdw(10, dword10)
        .cdw(11, value)
        .build())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::generic_command::Direction;

    #[test]
    fn get_features_select() {
        let command = create_get_features_command(
            FeatureIdentifier::TemperatureThreshold.into(),
            FeatureSelect::Saved,
            0,
        )
        .unwrap();

        assert_eq!(0x0a, command.opcode());
        assert_eq!(Some(0x0204), command.cdw(10));
        assert_eq!(Direction::Read, command.direction());
    }

    #[test]
    fn set_features_save_bit() {
        let command = create_set_features_command(0x04, 0x155, true, 0).unwrap();
        assert_eq!(0x09, command.opcode());
        assert_eq!(Some(0x8000_0004), command.cdw(10));
        assert_eq!(Some(0x155), command.cdw(11));
        assert_eq!(Direction::None, command.direction());

        let command = create_set_features_command(0x04, 0x155, false, 0).unwrap();
        assert_eq!(Some(0x04), command.cdw(10));
    }

    #[test]
    fn rejects_reserved_feature_and_select() {
        assert!(matches!(
            create_set_features_command(0, 0, false, 0),
            Err(AdminError::InvalidParameter { .. })
        ));
        assert!(matches!(
            FeatureSelect::from_raw(4),
            Err(AdminError::InvalidParameter { name: "select", .. })
        ));
        assert_eq!(FeatureSelect::SupportedCapabilities, FeatureSelect::from_raw(3).unwrap());
    }
}
