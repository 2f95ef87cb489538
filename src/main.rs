use anyhow::{Context, Result};
use api_model::classfile::UnsupportedPolicy;
use api_model::cli::{Cli, Commands, OutputFormat};
use api_model::config::{SessionConfig, default_config_path, parse_component_arg};
use api_model::discovery::PathDiscovery;
use api_model::error::UnitFault;
use api_model::locator::{ComponentLocator, ComponentScan};
use api_model::model::{Type, TypeKind};
use clap::Parser;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = resolve_session_config(&cli)?;
    let locator = ComponentLocator::with_options(
        PathDiscovery::from_config(&config),
        config.decode_options(),
    );

    match cli.command.clone() {
        Commands::List { component } => {
            let component = locator.locate(&component)?;
            for root in component.type_roots() {
                println!("{}", root.qualified_name());
            }
        }
        Commands::Show {
            component,
            type_name,
            format,
        } => {
            let ty = locator
                .find_type(&component, &type_name)
                .with_context(|| format!("Failed to decode {type_name}"))?
                .with_context(|| format!("Type {type_name} not found in component {component}"))?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*ty)?),
                OutputFormat::Text => print!("{}", render_type(&ty)),
            }
        }
        Commands::Scan {
            component,
            format,
            strict,
        } => {
            let start = Instant::now();
            let scan = locator.scan(&component)?;
            let report = ScanReport::new(&scan, start.elapsed());
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => print!("{}", report.render_text()),
            }
            if strict && !scan.is_complete() {
                anyhow::bail!(
                    "{} unit(s) of component {component} could not be decoded",
                    scan.faults.len()
                );
            }
        }
        Commands::Digest {
            component,
            type_name,
        } => {
            let root = locator
                .locate(&component)?
                .find_type_root(&type_name)
                .with_context(|| format!("Type {type_name} not found in component {component}"))?;
            println!("{}  {}", root.digest()?, root.qualified_name());
        }
        Commands::Hierarchy {
            component,
            type_name,
        } => {
            let located = locator.locate(&component)?;
            located
                .find_type_root(&type_name)
                .with_context(|| format!("Type {type_name} not found in component {component}"))?;
            for name in located.superclass_chain(&type_name)?.iter().skip(1) {
                println!("{name}");
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "api_model=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Config file (flag, else env/default location), then `--component`
/// overrides on top.
fn resolve_session_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match cli.config.clone().or_else(default_config_path) {
        Some(path) => SessionConfig::load(&path)
            .with_context(|| format!("Failed to load session config: {}", path.display()))?,
        None => SessionConfig::default(),
    };

    for arg in &cli.components {
        let (id, root) = parse_component_arg(arg)?;
        config.add_root(id, root);
    }
    if cli.tolerate_unsupported {
        config.unsupported = UnsupportedPolicy::Record;
    }

    if config.components.is_empty() {
        anyhow::bail!("No components configured. Use --config FILE or --component ID=PATH");
    }
    Ok(config)
}

#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    component: &'a str,
    version: Option<&'a str>,
    types_decoded: usize,
    duration_ms: u64,
    types: Vec<&'a str>,
    faults: &'a [UnitFault],
}

impl<'a> ScanReport<'a> {
    fn new(scan: &'a ComponentScan, elapsed: Duration) -> Self {
        Self {
            component: scan.component.id(),
            version: scan.component.version(),
            types_decoded: scan.types.len(),
            duration_ms: elapsed.as_millis() as u64,
            types: scan.types.iter().map(|t| t.name.as_str()).collect(),
            faults: &scan.faults,
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("component: {}\n", self.component));
        if let Some(version) = self.version {
            out.push_str(&format!("version: {version}\n"));
        }
        out.push_str(&format!("types_decoded: {}\n", self.types_decoded));
        out.push_str(&format!("faults: {}\n", self.faults.len()));
        for fault in self.faults {
            out.push_str(&format!(
                "- {} [{:?}] {}: {}\n",
                fault.qualified_name, fault.kind, fault.location, fault.message
            ));
        }
        out
    }
}

fn render_type(ty: &Type) -> String {
    let keyword = match ty.kind {
        TypeKind::Class => "class",
        TypeKind::Interface => "interface",
        TypeKind::Enum => "enum",
        TypeKind::Annotation => "@interface",
    };
    let mut header: Vec<String> = ty
        .modifiers
        .names()
        .into_iter()
        .filter(|m| ty.kind == TypeKind::Class || *m != "abstract")
        .map(str::to_string)
        .collect();
    header.push(keyword.to_string());
    header.push(ty.name.clone());
    if let Some(superclass) = ty.superclass.as_deref().filter(|s| *s != "java.lang.Object") {
        header.push(format!("extends {superclass}"));
    }
    if !ty.interfaces.is_empty() {
        let verb = if ty.kind == TypeKind::Class || ty.kind == TypeKind::Enum {
            "implements"
        } else {
            "extends"
        };
        header.push(format!("{verb} {}", ty.interfaces.join(", ")));
    }

    let mut out = format!("{} {{\n", header.join(" "));
    for field in &ty.fields {
        let mut line = field.modifiers.names().join(" ");
        if !line.is_empty() {
            line.push(' ');
        }
        out.push_str(&format!("    {line}{} {};\n", field.type_name, field.name));
    }
    for method in &ty.methods {
        let mut line = method.modifiers.names().join(" ");
        if !line.is_empty() {
            line.push(' ');
        }
        let name = if method.is_constructor() {
            ty.simple_name()
        } else {
            method.name.as_str()
        };
        let returns = if method.is_constructor() {
            String::new()
        } else {
            format!("{} ", method.return_type)
        };
        out.push_str(&format!(
            "    {line}{returns}{name}({})",
            method.parameter_types.join(", ")
        ));
        if !method.thrown.is_empty() {
            out.push_str(&format!(" throws {}", method.thrown.join(", ")));
        }
        out.push_str(";\n");
    }
    out.push_str("}\n");
    out
}
