use bit_field::BitField;
use shared_derive::U8Enum;

use crate::{
    generic_command::{AdminCommand, CommandOpcode},
    AdminError, Result,
};

/// Size of every identify data structure
pub const IDENTIFY_DATA_SIZE: u32 = 4096;

/// CNS Value
///
/// See: NVM Express Base Spec: Figure 274: Identify CNS Value
#[allow(missing_docs)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, U8Enum)]
pub enum Cns {
    Namespace = 0x0,
    Controller = 0x1,
}

/// The data structure an identify command asks for
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyTarget {
    Namespace { nsid: u32 },
    Controller,
}

impl IdentifyTarget {
    /// Create from a raw CNS value.
    ///
    /// `nsid` is ignored for the controller.
    pub fn from_raw(cns: u8, nsid: u32) -> Result<Self> {
        match Cns::try_from(cns) {
            Ok(Cns::Namespace) => Ok(IdentifyTarget::Namespace { nsid }),
            Ok(Cns::Controller) => Ok(IdentifyTarget::Controller),
            Err(invalid) => Err(AdminError::invalid(
                "cns",
                format!("{:#x} is not supported", invalid.value),
            )),
        }
    }

    /// the CNS value
    pub fn cns(&self) -> Cns {
        match self {
            IdentifyTarget::Namespace { nsid: _ } => Cns::Namespace,
            IdentifyTarget::Controller => Cns::Controller,
        }
    }
}

/// Create the [AdminCommand] for an identify command
///
/// See: NVM Express Base Spec: 5.17
pub fn create_identify_command(target: IdentifyTarget) -> Result<AdminCommand> {
    let mut dword10: u32 = 0;
    dword10.set_bits(0..=7, u8::from(target.cns()) as u32);

    let nsid = match target {
        IdentifyTarget::Namespace { nsid: 0 } => {
            return Err(AdminError::invalid("namespace id", "0 is not a valid namespace"));
        }
        IdentifyTarget::Namespace { nsid } => nsid,
        IdentifyTarget::Controller => {
            // NSID not used
            0
        }
    };

    Ok(AdminCommand::builder(CommandOpcode::Identify.into())
        .namespace_id(nsid)
        .read(IDENTIFY_DATA_SIZE)
        .cdw(10, dword10)
        .build())
}
