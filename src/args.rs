use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use nvme_admin::{admin_commands::FeatureSelect, PayloadFormat, TransportConfig};

/// Issue NVMe admin commands through `nvme admin-passthru` and print the
/// decoded result as json
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    /// the NVMe controller character device
    #[arg(short, long, default_value = "/dev/nvme0")]
    pub device: PathBuf,

    #[command(flatten)]
    pub transport: TransportOptions,

    /// use NVMe short form field names (`cw`, `ctemp`, `poh`, ...)
    #[arg(short, long)]
    pub short_keys: bool,

    /// log level, can be overwritten by the `RUST_LOG` env variable
    #[arg(long, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,

    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// read the SMART / Health Information log
    SmartLog,
    /// identify a namespace
    IdNs(IdNsArgs),
    /// identify the controller
    IdCtrl,
    /// read the value of a feature
    GetFeature(GetFeatureArgs),
    /// set the value of a feature
    SetFeature(SetFeatureArgs),
    /// read a raw log page and print it as hex dump
    GetLog(GetLogArgs),
}

#[derive(Args, Debug)]
pub struct TransportOptions {
    /// fails a command after `timeout` seconds
    #[arg(long, default_value_t = 180)]
    pub timeout: u64,

    /// the `nvme` executable
    #[arg(long, default_value = "nvme")]
    pub nvme_bin: PathBuf,

    /// transfer payloads as raw binary instead of a hex dump
    #[arg(long)]
    pub raw_binary: bool,

    /// let `nvme` report the command latency
    #[arg(long)]
    pub latency: bool,
}

impl TransportOptions {
    pub fn config(&self) -> TransportConfig {
        TransportConfig {
            nvme_binary: self.nvme_bin.clone(),
            payload_format: if self.raw_binary {
                PayloadFormat::Binary
            } else {
                PayloadFormat::HexDump
            },
            report_latency: self.latency,
            default_timeout: Duration::from_secs(self.timeout),
        }
    }
}

#[derive(Args, Debug)]
pub struct IdNsArgs {
    /// namespace to identify
    #[arg(short, long, default_value_t = 1, value_parser = parse_u32)]
    pub namespace_id: u32,
}

#[derive(Args, Debug)]
pub struct GetFeatureArgs {
    /// feature identifier, e.g. 0x04 for the temperature threshold
    #[arg(short, long, value_parser = parse_u8)]
    pub feature_id: u8,

    /// which value to report
    #[arg(short, long, value_enum, default_value_t = Select::Current)]
    pub select: Select,

    /// 0 for controller wide features
    #[arg(short, long, default_value_t = 0, value_parser = parse_u32)]
    pub namespace_id: u32,
}

#[derive(Args, Debug)]
pub struct SetFeatureArgs {
    /// feature identifier
    #[arg(short, long, value_parser = parse_u8)]
    pub feature_id: u8,

    /// new value, written to CDW11 unchanged
    #[arg(short, long, value_parser = parse_u32)]
    pub value: u32,

    /// persist the value across power cycles
    #[arg(long)]
    pub save: bool,

    /// 0 for controller wide features
    #[arg(short, long, default_value_t = 0, value_parser = parse_u32)]
    pub namespace_id: u32,
}

#[derive(Args, Debug)]
pub struct GetLogArgs {
    /// log page identifier
    #[arg(short = 'i', long, value_parser = parse_u8)]
    pub log_id: u8,

    /// number of bytes to read, a multiple of 4
    #[arg(short = 'l', long, value_parser = parse_u32)]
    pub log_len: u32,

    /// defaults to the broadcast namespace
    #[arg(short, long, default_value = "0xffffffff", value_parser = parse_u32)]
    pub namespace_id: u32,
}

/// Get Features select field (default current)
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Select {
    /// current value
    Current,
    /// default value
    Default,
    /// last saved value
    Saved,
    /// supported capabilities of the feature
    Supported,
}

impl From<Select> for FeatureSelect {
    fn from(value: Select) -> Self {
        match value {
            Select::Current => FeatureSelect::Current,
            Select::Default => FeatureSelect::Default,
            Select::Saved => FeatureSelect::Saved,
            Select::Supported => FeatureSelect::SupportedCapabilities,
        }
    }
}

/// parse a decimal or `0x` prefixed hex number
fn parse_u32(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid number {value:?}: {e}"))
}

fn parse_u8(value: &str) -> Result<u8, String> {
    let parsed = parse_u32(value)?;
    u8::try_from(parsed).map_err(|_| format!("{value} does not fit into a byte"))
}
