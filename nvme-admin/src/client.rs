//! High level access to the admin commands of a single controller

use std::time::Duration;

use crate::{
    admin_commands::{
        create_get_features_command, create_get_log_page_command, create_identify_command,
        create_set_features_command, create_smart_log_command, FeatureSelect, IdentifyTarget,
    },
    generic_command::{AdminCommand, CompletionStatus, Direction},
    payload,
    record::{FeatureValue, IdentifyControllerRecord, IdentifyNamespaceRecord, SmartLogRecord},
    status_parser,
    transport::{DevicePath, Transport},
    AdminError, Result,
};

/// Successful completion of a command together with its data buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// the decoded completion
    pub status: CompletionStatus,
    /// data read from the controller, empty for commands without read data
    pub payload: Vec<u8>,
}

/// Issues admin commands to a single device through a [Transport]
///
/// Commands are issued one at a time, each call waits for its command to
/// complete. Nothing is retried.
#[derive(Debug)]
pub struct AdminClient<T> {
    transport: T,
    device: DevicePath,
    timeout: Duration,
}

impl<T: Transport> AdminClient<T> {
    /// Create a client for `device`, using the default timeout of `transport`
    pub fn new(transport: T, device: DevicePath) -> Self {
        let timeout = transport.default_timeout();
        Self {
            transport,
            device,
            timeout,
        }
    }

    /// Use `timeout` for every command issued by this client
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// the device commands are sent to
    pub fn device(&self) -> &DevicePath {
        &self.device
    }

    /// the per command timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issue `command` and wait for its completion.
    ///
    /// A completion with an error status is returned as [AdminError::Status].
    /// For [Direction::Read] commands the payload is extracted according to
    /// the [PayloadFormat](crate::PayloadFormat) of the transport.
    pub async fn submit(&self, command: &AdminCommand) -> Result<Completion> {
        log::debug!("submit {command} to {}", self.device);

        let output = match self
            .transport
            .execute(command, &self.device, self.timeout)
            .await
        {
            Ok(output) => output,
            Err(err) => {
                log::error!("{command} on {} failed: {err}", self.device);
                return Err(err);
            }
        };

        let parsed = match status_parser::parse_output(&output) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::error!(
                    "`{}` failed with exit code {:?}\nstderr:\n{}",
                    output.command_line,
                    output.exit_code,
                    output.stderr
                );
                return Err(err);
            }
        };

        if !parsed.status.is_success() {
            let status = parsed.status.status();
            log::error!(
                "`{}` completed with {status}\nstderr:\n{}",
                output.command_line,
                output.stderr
            );
            return Err(AdminError::Status {
                status,
                completion: Box::new(parsed.status),
            });
        }
        if !output.success() {
            log::warn!(
                "`{}` exited with {:?} but reported a successful completion",
                output.command_line,
                output.exit_code
            );
        } else if !parsed.reported {
            log::warn!(
                "`{}` reported no completion status, assuming success",
                output.command_line
            );
        }

        let payload = if command.direction() == Direction::Read && command.data_length() > 0 {
            let mut data = payload::extract(&parsed.payload, self.transport.payload_format())?;
            let expected = command.data_length() as usize;
            if data.len() < expected {
                return Err(AdminError::MalformedPayload(format!(
                    "`{}` returned {} bytes, expected {expected}",
                    output.command_line,
                    data.len()
                )));
            }
            data.truncate(expected);
            data
        } else {
            Vec::new()
        };

        Ok(Completion {
            status: parsed.status,
            payload,
        })
    }

    /// Read `log_length_bytes` of log page `log_page_id`
    pub async fn get_log_page(
        &self,
        log_page_id: u8,
        namespace_id: u32,
        log_length_bytes: u32,
    ) -> Result<Vec<u8>> {
        let command = create_get_log_page_command(log_page_id, namespace_id, log_length_bytes)?;
        Ok(self.submit(&command).await?.payload)
    }

    /// Read the controller wide SMART / Health Information log page
    pub async fn smart_log(&self) -> Result<SmartLogRecord> {
        let completion = self.submit(&create_smart_log_command()?).await?;
        SmartLogRecord::decode(&completion.payload)
    }

    /// Identify namespace `nsid`
    pub async fn identify_namespace(&self, nsid: u32) -> Result<IdentifyNamespaceRecord> {
        let command = create_identify_command(IdentifyTarget::Namespace { nsid })?;
        let completion = self.submit(&command).await?;
        IdentifyNamespaceRecord::decode(&completion.payload)
    }

    /// Identify the controller
    pub async fn identify_controller(&self) -> Result<IdentifyControllerRecord> {
        let command = create_identify_command(IdentifyTarget::Controller)?;
        let completion = self.submit(&command).await?;
        IdentifyControllerRecord::decode(&completion.payload)
    }

    /// Read the value of feature `feature_id`
    ///
    /// With [FeatureSelect::SupportedCapabilities] dword 0 holds capability
    /// bits instead of a value and is returned as [FeatureValue::Unknown].
    pub async fn get_feature(
        &self,
        feature_id: u8,
        select: FeatureSelect,
        namespace_id: u32,
    ) -> Result<FeatureValue> {
        let command = create_get_features_command(feature_id, select, namespace_id)?;
        let dword0 = self.submit(&command).await?.status.dword0;

        Ok(match select {
            FeatureSelect::SupportedCapabilities => FeatureValue::Unknown {
                feature_id,
                raw_dword0: dword0,
            },
            FeatureSelect::Current | FeatureSelect::Default | FeatureSelect::Saved => {
                FeatureValue::decode(feature_id, dword0)
            }
        })
    }

    /// Set feature `feature_id` to the raw CDW11 `value`
    ///
    /// `save` makes the value persist across power cycles.
    pub async fn set_feature(
        &self,
        feature_id: u8,
        value: u32,
        save: bool,
        namespace_id: u32,
    ) -> Result<CompletionStatus> {
        let command = create_set_features_command(feature_id, value, save, namespace_id)?;
        Ok(self.submit(&command).await?.status)
    }

    /// Set a decoded feature value
    pub async fn set_feature_value(
        &self,
        value: &FeatureValue,
        save: bool,
        namespace_id: u32,
    ) -> Result<CompletionStatus> {
        self.set_feature(value.feature_id(), value.encode_dword11(), save, namespace_id)
            .await
    }
}
