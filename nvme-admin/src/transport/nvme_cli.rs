//! [Transport] over the `nvme` command line tool, using `nvme admin-passthru`

use std::{
    ffi::{OsStr, OsString},
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tempfile::NamedTempFile;
use tokio::{process::Command, time};

use super::{DevicePath, Transport, TransportOutput, DEFAULT_TIMEOUT};
use crate::{
    generic_command::{AdminCommand, Direction},
    payload::PayloadFormat,
    AdminError, Result,
};

/// Configuration of a [NvmeCliTransport]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// the `nvme` executable, looked up in `PATH` if it is not a path
    pub nvme_binary: PathBuf,
    /// [PayloadFormat::Binary] passes `--raw-binary`
    pub payload_format: PayloadFormat,
    /// pass `--latency` so the tool reports the command latency
    pub report_latency: bool,
    /// timeout for commands if the caller does not specify one
    pub default_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            nvme_binary: PathBuf::from("nvme"),
            payload_format: PayloadFormat::HexDump,
            report_latency: false,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Executes admin commands by spawning `nvme admin-passthru`
///
/// The process is killed if the timeout expires or the returned future is
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct NvmeCliTransport {
    config: TransportConfig,
}

impl NvmeCliTransport {
    /// Create a new transport
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// the configuration of this transport
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Arguments passed to the `nvme` binary for `command`.
    ///
    /// `input_file` holds the write data of [Direction::Write] commands.
    pub fn arguments(
        &self,
        command: &AdminCommand,
        device: &DevicePath,
        input_file: Option<&Path>,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["admin-passthru".into(), device.as_path().into()];

        args.push(format!("--opcode={:#04x}", command.opcode()).into());
        args.push(format!("--namespace-id={}", command.namespace_id()).into());
        for (index, dword) in command.dwords() {
            args.push(format!("--cdw{index}={dword:#010x}").into());
        }
        if command.data_length() > 0 {
            args.push(format!("--data-len={}", command.data_length()).into());
        }

        match command.direction() {
            Direction::Read => args.push("--read".into()),
            Direction::Write => {
                args.push("--write".into());
                if let Some(input_file) = input_file {
                    args.push(concat("--input-file=", input_file));
                }
            }
            Direction::None => {}
        }

        if self.config.payload_format == PayloadFormat::Binary {
            args.push("--raw-binary".into());
        }
        if self.config.report_latency {
            args.push("--latency".into());
        }

        args
    }

    async fn run(
        &self,
        command: &AdminCommand,
        device: &DevicePath,
        timeout: Duration,
    ) -> Result<TransportOutput> {
        // the file has to outlive the process
        let input_file = command.write_data().map(stage_write_data).transpose()?;

        let args = self.arguments(command, device, input_file.as_ref().map(|f| f.path()));
        let command_line = command_line(&self.config.nvme_binary, &args);

        let mut cmd = Command::new(&self.config.nvme_binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::info!("Executing: {command_line}");

        let process = cmd
            .spawn()
            .map_err(|e| AdminError::io(format!("failed to spawn `{command_line}`"), e))?;

        match time::timeout(timeout, process.wait_with_output()).await {
            Ok(result) => {
                let output = result
                    .map_err(|e| AdminError::io(format!("failed to wait for `{command_line}`"), e))?;
                Ok(TransportOutput {
                    command_line,
                    stdout: output.stdout,
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                })
            }
            Err(_) => Err(AdminError::Timeout {
                command_line,
                timeout,
            }),
        }
    }
}

impl Transport for NvmeCliTransport {
    fn payload_format(&self) -> PayloadFormat {
        self.config.payload_format
    }

    fn default_timeout(&self) -> Duration {
        self.config.default_timeout
    }

    async fn execute(
        &self,
        command: &AdminCommand,
        device: &DevicePath,
        timeout: Duration,
    ) -> Result<TransportOutput> {
        self.run(command, device, timeout).await
    }
}

fn stage_write_data(data: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()
        .map_err(|e| AdminError::io("failed to create temp file for write data", e))?;
    file.write_all(data)
        .and_then(|_| file.flush())
        .map_err(|e| AdminError::io("failed to stage write data", e))?;
    Ok(file)
}

fn concat<A: AsRef<OsStr>, B: AsRef<OsStr>>(a: A, b: B) -> OsString {
    let a = a.as_ref();
    let b = b.as_ref();

    let mut result = OsString::with_capacity(a.len() + b.len());
    result.push(a);
    result.push(b);

    result
}

fn command_line(binary: &Path, args: &[OsString]) -> String {
    let mut line = binary.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::admin_commands::{
        create_get_features_command, create_identify_command, create_set_features_command,
        create_smart_log_command, FeatureSelect, IdentifyTarget,
    };

    fn args(transport: &NvmeCliTransport, command: &AdminCommand) -> Vec<String> {
        transport
            .arguments(command, &DevicePath::new("/dev/nvme0"), None)
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn smart_log_arguments() {
        let transport = NvmeCliTransport::default();
        let command = create_smart_log_command().unwrap();

        assert_eq!(
            vec![
                "admin-passthru",
                "/dev/nvme0",
                "--opcode=0x02",
                "--namespace-id=4294967295",
                "--cdw10=0x007f0002",
                "--data-len=512",
                "--read",
            ],
            args(&transport, &command)
        );
    }

    #[test]
    fn binary_and_latency_flags() {
        let transport = NvmeCliTransport::new(TransportConfig {
            payload_format: PayloadFormat::Binary,
            report_latency: true,
            ..Default::default()
        });
        let command = create_identify_command(IdentifyTarget::Namespace { nsid: 1 }).unwrap();

        let args = args(&transport, &command);
        assert_eq!("--namespace-id=1", args[3]);
        assert_eq!("--cdw10=0x00000000", args[4]);
        assert_eq!(
            vec!["--data-len=4096", "--read", "--raw-binary", "--latency"],
            args[5..].to_vec()
        );
    }

    #[test]
    fn features_without_data() {
        let transport = NvmeCliTransport::default();

        let get = create_get_features_command(0x04, FeatureSelect::Current, 0).unwrap();
        let args_get = args(&transport, &get);
        assert_eq!("--opcode=0x0a", args_get[2]);
        assert!(!args_get.iter().any(|a| a.starts_with("--data-len")));

        let set = create_set_features_command(0x04, 0x155, true, 0).unwrap();
        let args_set = args(&transport, &set);
        assert_eq!(
            vec!["--cdw10=0x80000004", "--cdw11=0x00000155"],
            args_set[4..].to_vec()
        );
    }

    #[test]
    fn write_data_is_staged() {
        let transport = NvmeCliTransport::default();
        let command = AdminCommand::builder(0x09)
            .write(vec![1, 2, 3, 4])
            .unwrap()
            .cdw(10, 0x0e)
            .build();

        let file = stage_write_data(command.write_data().unwrap()).unwrap();
        assert_eq!(vec![1, 2, 3, 4], std::fs::read(file.path()).unwrap());

        let args = transport.arguments(&command, &DevicePath::new("/dev/nvme1"), Some(file.path()));
        assert_eq!(OsString::from("--cdw10=0x0000000e"), args[4]);
        assert_eq!(OsString::from("--data-len=4"), args[5]);
        assert_eq!(OsString::from("--write"), args[6]);
        assert_eq!(concat("--input-file=", file.path()), args[7]);
    }

    #[tokio::test]
    async fn missing_binary_is_io_error() {
        let transport = NvmeCliTransport::new(TransportConfig {
            nvme_binary: PathBuf::from("/nonexistent/nvme"),
            ..Default::default()
        });
        let command = create_smart_log_command().unwrap();

        let result = transport
            .execute(&command, &DevicePath::new("/dev/nvme0"), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(AdminError::Io { .. })));
    }

    /// true once `pid` is either reaped or a zombie waiting to be reaped
    #[cfg(target_os = "linux")]
    fn is_dead(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/status")) {
            Ok(status) => status.lines().any(|l| l.starts_with("State:") && l.contains('Z')),
            Err(_) => true,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_the_process() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = dir.path().join("nvme");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho $$ > {}\nexec sleep 30\n", pid_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let transport = NvmeCliTransport::new(TransportConfig {
            nvme_binary: script,
            ..Default::default()
        });
        let command = create_smart_log_command().unwrap();

        let started = std::time::Instant::now();
        let result = transport
            .execute(
                &command,
                &DevicePath::new("/dev/nvme0"),
                Duration::from_millis(500),
            )
            .await;
        assert!(matches!(result, Err(AdminError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        for _ in 0..50 {
            if is_dead(pid) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("nvme process {pid} survived the timeout");
    }
}
