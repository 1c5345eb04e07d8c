use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use tracing::debug;
use uidmap_registry::RegistryConfig;
use uidmap_store::DurableStore;
use uidmap_types::Binding;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Id(args) => cmd_id(&config, args, &cli.format),
        Command::Lookup(args) => cmd_lookup(&config, args, &cli.format),
        Command::List => cmd_list(&config, &cli.format),
        Command::Compact => cmd_compact(&config),
    }
}

fn resolve_config(cli: &Cli) -> anyhow::Result<RegistryConfig> {
    let mut config = match &cli.config {
        Some(path) => RegistryConfig::load(path)?,
        None => RegistryConfig::default(),
    };
    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }
    debug!(store = %config.store_path.display(), sync_mode = ?config.sync_mode, "resolved configuration");
    Ok(config)
}

fn cmd_id(config: &RegistryConfig, args: IdArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let registry = config.open_registry()?;
    let mut bindings = Vec::with_capacity(args.keys.len());
    for key in &args.keys {
        let id = registry
            .get_or_create_id(key)
            .with_context(|| format!("allocating id for {key:?}"))?;
        bindings.push(Binding::new(key.as_str(), id));
    }
    registry.close()?;
    print!("{}", render_bindings(&bindings, format));
    Ok(())
}

fn cmd_lookup(config: &RegistryConfig, args: LookupArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let registry = config.open_registry()?;
    let resolved: Vec<(i64, Option<String>)> = args
        .ids
        .iter()
        .map(|raw| (*raw, registry.lookup_raw(*raw)))
        .collect();
    print!("{}", render_lookups(&resolved, format));
    Ok(())
}

fn cmd_list(config: &RegistryConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let registry = config.open_registry()?;
    let bindings = registry.bindings();
    if bindings.is_empty() && matches!(format, OutputFormat::Text) {
        println!("No bindings.");
        return Ok(());
    }
    print!("{}", render_bindings(&bindings, format));
    Ok(())
}

fn cmd_compact(config: &RegistryConfig) -> anyhow::Result<()> {
    let store = config.open_store()?;
    store.load()?;
    let before = store.records_on_disk();
    store.compact()?;
    println!(
        "{} Compacted {}: {} records -> {}",
        "✓".green().bold(),
        store.path().display().to_string().bold(),
        before,
        store.records_on_disk()
    );
    Ok(())
}

fn render_bindings(bindings: &[Binding], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json => format!("{}\n", json!(bindings)),
        OutputFormat::Text => bindings
            .iter()
            .map(|b| format!("{} -> {}\n", b.key.bold(), b.id.to_string().cyan()))
            .collect(),
    }
}

fn render_lookups(resolved: &[(i64, Option<String>)], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = resolved
                .iter()
                .map(|(id, key)| json!({ "id": id, "key": key }))
                .collect();
            format!("{}\n", json!(rows))
        }
        OutputFormat::Text => resolved
            .iter()
            .map(|(id, key)| match key {
                Some(key) => format!("{} -> {}\n", id.to_string().cyan(), key.bold()),
                None => format!("{} -> {}\n", id.to_string().cyan(), "(unbound)".dimmed()),
            })
            .collect(),
    }
}
