use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use labwire_wire::{CommandReply, ServerDescriptor};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
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

pub fn print_descriptor(descriptor: &ServerDescriptor, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(descriptor),
        OutputFormat::Table => {
            let mut table = new_table(vec!["TYPE", "HOST", "PORT", "UUID"]);
            table.add_row(vec![
                descriptor.server_type.clone(),
                descriptor.host.clone(),
                descriptor.port.to_string(),
                descriptor.uuid.clone(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} at {}:{} (uuid {})",
                descriptor.server_type, descriptor.host, descriptor.port, descriptor.uuid
            );
        }
    }
}

pub fn print_features(features: &[String], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "features": features })),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FEATURE"]);
            for feature in features {
                table.add_row(vec![feature.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for feature in features {
                println!("{feature}");
            }
        }
    }
}

pub fn print_reply(reply: &CommandReply, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(reply),
        OutputFormat::Table => {
            let mut table = new_table(vec!["RETURN", "VALUE"]);
            for (name, value) in &reply.returns {
                table.add_row(vec![name.clone(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if reply.returns.is_empty() {
                println!("{}/{}: ok", reply.feature, reply.command);
            }
            for (name, value) in &reply.returns {
                println!("{name} = {value}");
            }
        }
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
