//! NVMe admin command protocol layer
//!
//! Encodes admin commands (Get Log Page, Identify, Get/Set Features) into
//! command dwords, hands them to a passthrough [Transport] and decodes the
//! completion status and fixed layout payloads that come back.
//!
//! The specification documents can be found at <https://nvmexpress.org/specifications/>
//! specifically: NVM Express Base Specification
//!
//! ```no_run
//! # async fn demo() -> Result<(), nvme_admin::AdminError> {
//! use nvme_admin::{AdminClient, DevicePath, NvmeCliTransport, TransportConfig};
//!
//! let transport = NvmeCliTransport::new(TransportConfig::default());
//! let client = AdminClient::new(transport, DevicePath::new("/dev/nvme0"));
//! let smart = client.smart_log().await?;
//! println!("power on hours: {}", smart.power_on_hours);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod admin_commands;
pub mod client;
pub mod error;
pub mod generic_command;
pub mod payload;
pub mod primitive_enum;
pub mod record;
pub mod status_parser;
pub mod transport;

pub use client::{AdminClient, Completion};
pub use error::{AdminError, Result};
pub use generic_command::*;
pub use payload::PayloadFormat;
pub use record::{
    FeatureValue, IdentifyControllerRecord, IdentifyNamespaceRecord, KeyStyle, LbaFormat,
    RecordMap, SmartLogRecord,
};
pub use transport::{DevicePath, NvmeCliTransport, Transport, TransportConfig, TransportOutput};
