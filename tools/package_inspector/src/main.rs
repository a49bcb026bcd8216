//! Inspection tool for content packages
//!
//! Loads one or more packages from a content root and prints what was
//! registered: metadata, presets bucketed by type, group catalogs and
//! material mappings. Useful for checking what a package actually
//! contributes before shipping it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};

use content_engine::config::ContentConfig;
use content_engine::foundation::logging;
use content_engine::package::{Package, PackageManager};
use content_engine::registry::ClassRegistry;

const DEFAULT_CONTENT_ROOT: &str = "data";

fn main() -> Result<()> {
    logging::init();

    let matches = Command::new("package_inspector")
        .about("Loads content packages and prints their registered presets")
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("DIR")
                .help("Content root directory the packages live in")
                .default_value(DEFAULT_CONTENT_ROOT),
        )
        .arg(
            Arg::new("packages")
                .value_name("PACKAGE")
                .num_args(1..)
                .required(true)
                .help("Package directory names to load, in order"),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .action(ArgAction::SetTrue)
                .help("Let re-declared presets replace earlier ones"),
        )
        .arg(
            Arg::new("metadata-only")
                .long("metadata-only")
                .action(ArgAction::SetTrue)
                .help("Read package metadata without loading any presets"),
        )
        .arg(
            Arg::new("pools")
                .long("pools")
                .action(ArgAction::SetTrue)
                .help("Print instance pool usage after loading"),
        )
        .get_matches();

    let root = PathBuf::from(matches.get_one::<String>("root").expect("has default"));
    let packages: Vec<String> = matches
        .get_many::<String>("packages")
        .expect("required")
        .cloned()
        .collect();

    if matches.get_flag("metadata-only") {
        for name in &packages {
            let package = Package::read_metadata(&root, name, Some(logging::progress_logger()))
                .with_context(|| format!("reading metadata of package '{name}'"))?;
            print_metadata(&package);
        }
        return Ok(());
    }

    let config = ContentConfig {
        content_root: root,
        packages,
        overwrite_duplicates: matches.get_flag("overwrite"),
        ..ContentConfig::default()
    };

    let mut manager = PackageManager::new().context("registering content classes")?;
    manager.load_all(&config).context("loading packages")?;

    for package in manager.packages() {
        print_metadata(package);
        print_contents(package, manager.classes());
    }

    if matches.get_flag("pools") {
        let mut writer = content_engine::writer::Writer::to_buffer();
        manager
            .classes()
            .dump_pool_info(&mut writer)
            .context("collecting pool diagnostics")?;
        if let Some(report) = writer.into_string() {
            print!("{report}");
        }
    }
    Ok(())
}

fn print_metadata(package: &Package) {
    println!("package '{}'", package.name());
    if !package.friendly_name().is_empty() {
        println!("  name:        {}", package.friendly_name());
    }
    if !package.author().is_empty() {
        println!("  author:      {}", package.author());
    }
    if !package.description().is_empty() {
        println!("  description: {}", package.description());
    }
    println!("  version:     {}", package.version());
    if let Some(id) = package.package_id() {
        println!("  id:          {id}");
    }
}

fn print_contents(package: &Package, classes: &ClassRegistry) {
    println!("  presets:     {}", package.len());
    for class_id in classes.class_ids() {
        let info = classes.class(class_id);
        if !info.is_concrete() {
            continue;
        }
        let of_type = package.collect_by_type(classes, Some(class_id));
        let exact: Vec<&str> = of_type
            .iter()
            .filter(|preset| preset.class_name() == info.name())
            .map(|preset| preset.base().preset_name())
            .collect();
        if exact.is_empty() {
            continue;
        }
        println!("    {} ({}):", info.name(), exact.len());
        for name in exact {
            println!("      {name}");
        }
    }

    if !package.groups().is_empty() {
        println!("  groups:      {}", package.groups().join(", "));
    }

    let mapped: Vec<String> = package
        .material_mappings()
        .iter()
        .enumerate()
        .filter(|&(_, &to)| to != 0)
        .map(|(from, &to)| format!("{from} -> {to}"))
        .collect();
    if !mapped.is_empty() {
        println!("  materials:   {}", mapped.join(", "));
    }
    println!();
}
