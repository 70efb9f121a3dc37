use anyhow::{Context, Result};
use clap::Parser;
use nvme_admin::{
    payload::format_hex_dump, AdminClient, DevicePath, KeyStyle, NvmeCliTransport, Transport,
};
use serde::Serialize;
use simple_logger::SimpleLogger;

use crate::args::{AdminCommand, Arguments};

mod args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();

    SimpleLogger::new()
        .with_level(args.log_level)
        .env()
        .init()
        .context("failed to install logger")?;

    let transport = NvmeCliTransport::new(args.transport.config());
    let client = AdminClient::new(transport, DevicePath::new(&args.device));
    let style = if args.short_keys {
        KeyStyle::Short
    } else {
        KeyStyle::Long
    };

    if let Some(json) = run(&client, args.command, style).await? {
        println!("{json}");
    }

    Ok(())
}

async fn run<T: Transport>(
    client: &AdminClient<T>,
    command: AdminCommand,
    style: KeyStyle,
) -> Result<Option<String>> {
    let device = client.device();
    let json = match command {
        AdminCommand::SmartLog => {
            let smart = client
                .smart_log()
                .await
                .with_context(|| format!("smart-log on {device}"))?;
            let warnings = smart.critical_warnings();
            if !warnings.is_empty() {
                log::warn!("{device} reports critical warnings: {warnings:?}");
            }
            to_json(&smart.to_map(style))?
        }
        AdminCommand::IdNs(ns) => {
            let record = client
                .identify_namespace(ns.namespace_id)
                .await
                .with_context(|| format!("id-ns {} on {device}", ns.namespace_id))?;
            to_json(&record.to_map(style))?
        }
        AdminCommand::IdCtrl => {
            let record = client
                .identify_controller()
                .await
                .with_context(|| format!("id-ctrl on {device}"))?;
            to_json(&record.to_map(style))?
        }
        AdminCommand::GetFeature(get) => {
            let value = client
                .get_feature(get.feature_id, get.select.into(), get.namespace_id)
                .await
                .with_context(|| format!("get-feature {:#04x} on {device}", get.feature_id))?;
            to_json(&value.to_map(style))?
        }
        AdminCommand::SetFeature(set) => {
            let status = client
                .set_feature(set.feature_id, set.value, set.save, set.namespace_id)
                .await
                .with_context(|| format!("set-feature {:#04x} on {device}", set.feature_id))?;
            to_json(&status)?
        }
        AdminCommand::GetLog(get) => {
            let data = client
                .get_log_page(get.log_id, get.namespace_id, get.log_len)
                .await
                .with_context(|| format!("get-log {:#04x} on {device}", get.log_id))?;
            print!("{}", format_hex_dump(&data));
            return Ok(None);
        }
    };

    Ok(Some(json))
}

/// integers wider than 64 bit are kept, `serde_json::Value` would reject them
fn to_json<S: Serialize>(value: &S) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize result")
}

#[cfg(test)]
mod test {
    use super::*;
    use nvme_admin::record::{FieldValue, RecordMap};

    #[test]
    fn wide_counters_are_printed() {
        let mut map = RecordMap::with_capacity(2);
        map.push("data_units_read", FieldValue::Uint(u128::MAX));
        map.push("serial", FieldValue::Text("S1".into()));

        let json = to_json(&map).unwrap();
        assert!(json.contains(&format!("\"data_units_read\": {}", u128::MAX)));
        assert!(json.contains("\"serial\": \"S1\""));
    }
}
