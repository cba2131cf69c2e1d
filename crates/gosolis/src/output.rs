use std::io::IsTerminal;
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gosolis_device::DeviceInformation;
use gosolis_frame::DeviceId;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_table(rows: Vec<(String, String)>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (field, value) in rows {
        table.add_row(vec![field, value]);
    }
    println!("{table}");
}

pub fn print_status(info: &DeviceInformation, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(info),
        OutputFormat::Table => print_table(status_rows(info)),
        OutputFormat::Pretty => print!("{}", status_text(info)),
    }
}

fn status_rows(info: &DeviceInformation) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    for (idx, input) in info.inputs.iter().enumerate() {
        rows.push((
            format!("input {idx}"),
            format!("{:.1} V / {:.1} A", input.voltage, input.current),
        ));
    }

    let grid = &info.grid;
    let production = &info.production;
    rows.extend([
        (
            "grid".to_string(),
            format!(
                "{:.1} V / {:.1} A @ {:.2} Hz",
                grid.voltage, grid.current, grid.frequency
            ),
        ),
        ("power standard".to_string(), grid.power_standard.to_string()),
        ("grid status".to_string(), grid.grid_status.to_string()),
        ("total (kWh)".to_string(), format!("{:.0}", production.total)),
        ("today (kWh)".to_string(), format!("{:.1}", production.today)),
        (
            "yesterday (kWh)".to_string(),
            format!("{:.1}", production.yesterday),
        ),
        (
            "this month (kWh)".to_string(),
            format!("{:.0}", production.month),
        ),
        (
            "last month (kWh)".to_string(),
            format!("{:.0}", production.last_month),
        ),
        ("product".to_string(), info.product.to_string()),
        (
            "software version".to_string(),
            info.software_version.to_string(),
        ),
        ("serial".to_string(), info.serial_number.to_string()),
        (
            "temperature".to_string(),
            format!("{:.1} °C", info.temperature),
        ),
        ("status".to_string(), info.status.to_string()),
        ("error code".to_string(), info.error.to_string()),
        ("power curve".to_string(), info.power_curve.to_string()),
    ]);
    rows
}

fn status_text(info: &DeviceInformation) -> String {
    let mut out = String::new();
    for (idx, input) in info.inputs.iter().enumerate() {
        out.push_str(&format!(
            "Input {idx}: {:.1} V / {:.1} A\n",
            input.voltage, input.current
        ));
    }

    let grid = &info.grid;
    out.push_str(&format!(
        "Grid: {:.1} V / {:.1} A @ {:.2} Hz\n",
        grid.voltage, grid.current, grid.frequency
    ));

    let p = &info.production;
    out.push_str("Production:\n");
    out.push_str(&format!("\tTotal: {:.0}\n", p.total));
    out.push_str(&format!("\tToday: {:.1}\n", p.today));
    out.push_str(&format!("\tYesterday: {:.1}\n", p.yesterday));
    out.push_str(&format!("\tThis month: {:.0}\n", p.month));
    out.push_str(&format!("\tLast month: {:.0}\n", p.last_month));

    out.push_str("Inverter:\n");
    out.push_str(&format!("\tProduct type: {}\n", info.product));
    out.push_str(&format!("\tSoftware version: {}\n", info.software_version));
    out.push_str(&format!("\tSerial: 0x{}\n", info.serial_number));
    out.push_str(&format!("\tTemperature: {:.1} °C\n", info.temperature));
    out.push_str(&format!("\tStatus: {}\n", info.status.0));
    out.push_str(&format!("\tError code: {:#06x}\n", info.error.0));
    out
}

#[derive(Serialize)]
struct PingOutput {
    address: u8,
    latency_ms: f64,
}

pub fn print_ping(address: DeviceId, latency: Duration, format: OutputFormat) {
    let out = PingOutput {
        address: address.0,
        latency_ms: latency.as_secs_f64() * 1000.0,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(vec![
            ("address".to_string(), address.to_string()),
            ("latency".to_string(), format!("{:.1} ms", out.latency_ms)),
        ]),
        OutputFormat::Pretty => {
            println!("device {address} answered in {:.1} ms", out.latency_ms)
        }
    }
}

#[derive(Serialize)]
struct GridOutput {
    address: u8,
    grid: &'static str,
}

pub fn print_grid(address: DeviceId, state: &'static str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&GridOutput {
            address: address.0,
            grid: state,
        }),
        OutputFormat::Table => print_table(vec![
            ("address".to_string(), address.to_string()),
            ("grid".to_string(), state.to_string()),
        ]),
        OutputFormat::Pretty => println!("Done. Grid {state}."),
    }
}
