use std::fs;
use std::path::Path;

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use tracing::info;

use crate::cmd::{ConfigCommand, Context};
use crate::config::Config;
use crate::exit::{config_error, io_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

pub fn run(command: ConfigCommand, ctx: &Context) -> CliResult<i32> {
    match command {
        ConfigCommand::Save { file } => save(&ctx.config, &file),
        ConfigCommand::Show => {
            show(ctx);
            Ok(SUCCESS)
        }
    }
}

fn save(config: &Config, file: &Path) -> CliResult<i32> {
    let text = config.to_toml().map_err(config_error)?;
    fs::write(file, text)
        .map_err(|err| io_error(&format!("failed to write {}", file.display()), err))?;
    info!(path = %file.display(), "saved configuration");
    Ok(SUCCESS)
}

fn show(ctx: &Context) {
    let config = &ctx.config;
    let source = ctx
        .config_path
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());

    match ctx.format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Table => {
            let inverter = &config.inverter;
            let daemon = &config.daemon;
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"])
                .add_row(vec!["source".to_string(), source])
                .add_row(vec!["inverter.port".to_string(), inverter.port.clone()])
                .add_row(vec!["inverter.addr".to_string(), inverter.addr.to_string()])
                .add_row(vec!["inverter.baud".to_string(), inverter.baud.to_string()])
                .add_row(vec![
                    "inverter.timeout".to_string(),
                    format!("{} ms", inverter.timeout),
                ])
                .add_row(vec![
                    "daemon.interval".to_string(),
                    format!("{} s", daemon.interval),
                ])
                .add_row(vec![
                    "daemon.probe_interval".to_string(),
                    format!("{} s", daemon.probe_interval),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("# source: {source}");
            match config.to_toml() {
                Ok(text) => print!("{text}"),
                Err(err) => eprintln!("error: {err}"),
            }
        }
    }
}
