//! Command implementations

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;
use strata_archive::{Algorithm, Archive, ArchiveRecord, Registry, Version};
use uuid::Uuid;

use crate::util::{format_absolute_time, format_relative_time, format_size};

/// Resolve an archive reference to its registry record
///
/// Accepts a full UUID, a unique UUID prefix (4+ chars), a source
/// directory, or an archive directory.
fn resolve_archive(registry: &Registry, reference: &str) -> Result<ArchiveRecord> {
    if let Ok(id) = Uuid::parse_str(reference) {
        if let Some(record) = registry.find(Some(id), None, None)? {
            return Ok(record.clone());
        }
        bail!("no archive with id {reference}");
    }

    if reference.len() >= 4 {
        let needle = reference.to_ascii_lowercase();
        let matching: Vec<&ArchiveRecord> = registry
            .records()
            .iter()
            .filter(|record| record.id.to_string().starts_with(&needle))
            .collect();
        match matching.len() {
            1 => return Ok(matching[0].clone()),
            0 => {}
            n => bail!("ambiguous archive prefix '{reference}': matches {n} archives"),
        }
    }

    let as_path = Path::new(reference);
    if let Some(record) = registry.find(None, Some(as_path), None)? {
        return Ok(record.clone());
    }
    if let Some(record) = registry.find(None, None, Some(as_path))? {
        return Ok(record.clone());
    }

    bail!("unknown archive reference: '{reference}'")
}

fn resolve_version(archive: &Archive, reference: &str) -> Result<Version> {
    if let Ok(id) = Uuid::parse_str(reference) {
        return archive
            .get_version(id)
            .cloned()
            .with_context(|| format!("no version with id {reference}"));
    }

    let needle = reference.to_ascii_lowercase();
    let matching: Vec<&Version> = archive
        .versions()
        .filter(|version| version.id.to_string().starts_with(&needle))
        .collect();
    match matching.len() {
        1 => Ok(matching[0].clone()),
        0 => bail!("no version matches '{reference}'"),
        n => bail!("ambiguous version prefix '{reference}': matches {n} versions"),
    }
}

fn open_archive(registry: &Registry, reference: &str) -> Result<Archive> {
    let record = resolve_archive(registry, reference)?;
    Archive::open(&record.archive_dir)
        .with_context(|| format!("failed to open archive at {}", record.archive_dir.display()))
}

fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

pub fn create(
    registry_dir: &Path,
    source: &Path,
    archive_dir: &Path,
    algorithm: &str,
    max_versions: usize,
) -> Result<()> {
    let algorithm: Algorithm = algorithm.parse().with_context(|| {
        format!(
            "supported algorithms: {}",
            Algorithm::ALL.map(|a| a.name()).join(", ")
        )
    })?;

    let mut registry = Registry::open(registry_dir)?;
    let archive = Archive::create(&mut registry, source, archive_dir, algorithm, max_versions)?;

    println!(
        "{} archive {}",
        "Created".green().bold(),
        archive.id().to_string().cyan()
    );
    println!("  source:       {}", source.display());
    println!("  archive dir:  {}", archive_dir.display());
    println!("  algorithm:    {algorithm}");
    println!("  max versions: {max_versions}");
    Ok(())
}

pub fn archives(registry_dir: &Path) -> Result<()> {
    let registry = Registry::open(registry_dir)?;
    if registry.records().is_empty() {
        println!("No archives registered");
        return Ok(());
    }

    for (index, record) in registry.records().iter().enumerate() {
        println!(
            "{:>3}  {}  {} {} {}",
            index,
            record.id.to_string().cyan(),
            record.source_dir.display(),
            "->".dimmed(),
            record.archive_dir.display()
        );
    }
    Ok(())
}

pub fn info(registry_dir: &Path, reference: &str) -> Result<()> {
    let registry = Registry::open(registry_dir)?;
    let archive = open_archive(&registry, reference)?;
    let config = archive.config();

    println!("{}", "Archive".bold());
    println!("  id:           {}", archive.id().to_string().cyan());
    println!("  source:       {}", config.source_dir.display());
    println!("  archive dir:  {}", archive.archive_dir().display());
    println!("  algorithm:    {}", config.algorithm);
    println!("  max versions: {}", config.max_versions);
    println!("  versions:     {}", archive.chain().len());
    Ok(())
}

pub fn snapshot(registry_dir: &Path, reference: &str) -> Result<()> {
    let registry = Registry::open(registry_dir)?;
    let mut archive = open_archive(&registry, reference)?;

    let version = archive.create_version()?;
    println!(
        "{} version {}{}",
        "Created".green().bold(),
        version.id.to_string().cyan(),
        if version.is_base { " (base)" } else { "" }
    );
    Ok(())
}

pub fn versions(registry_dir: &Path, reference: &str) -> Result<()> {
    let registry = Registry::open(registry_dir)?;
    let archive = open_archive(&registry, reference)?;

    for (index, version) in archive.versions().enumerate() {
        let marker = if version.is_base {
            "base".yellow().to_string()
        } else {
            "    ".to_string()
        };
        println!(
            "{:>3}  {}  {}  {}  ({})",
            index,
            version.id.to_string().cyan(),
            marker,
            format_absolute_time(version.created_at_ms),
            format_relative_time(version.created_at_ms).dimmed()
        );
    }
    Ok(())
}

pub fn files(registry_dir: &Path, reference: &str, version_ref: &str, exact: bool) -> Result<()> {
    let registry = Registry::open(registry_dir)?;
    let archive = open_archive(&registry, reference)?;
    let version = resolve_version(&archive, version_ref)?;
    let resolver = archive.resolver();

    let mut count = 0u64;
    let mut total_bytes = 0u64;
    let mut list = |entry: strata_archive::FileEntry| -> Result<()> {
        total_bytes += std::fs::metadata(&entry.stored).map(|m| m.len()).unwrap_or(0);
        count += 1;
        println!("{}", entry.stored.display());
        Ok(())
    };

    if exact {
        for entry in resolver.exact_files(&version) {
            list(entry?)?;
        }
    } else {
        for entry in resolver.files(&version)? {
            list(entry?)?;
        }
    }

    println!(
        "\n{count} file(s), {} in version {}{}",
        format_size(total_bytes),
        version.id.to_string().cyan(),
        if exact { " (exact)" } else { "" }
    );
    Ok(())
}

pub fn export(
    registry_dir: &Path,
    reference: &str,
    version_ref: &str,
    destination: &PathBuf,
    exact: bool,
) -> Result<()> {
    let registry = Registry::open(registry_dir)?;
    let archive = open_archive(&registry, reference)?;
    let version = resolve_version(&archive, version_ref)?;

    let exported = archive.resolver().export(&version, destination, exact)?;
    println!(
        "{} {exported} file(s) from version {} to {}",
        "Exported".green().bold(),
        version.id.to_string().cyan(),
        destination.display()
    );
    Ok(())
}

pub fn remove_version(
    registry_dir: &Path,
    reference: &str,
    version_ref: &str,
    yes: bool,
) -> Result<()> {
    let registry = Registry::open(registry_dir)?;
    let mut archive = open_archive(&registry, reference)?;
    let version = resolve_version(&archive, version_ref)?;

    let prompt = format!(
        "Remove version {} created {}?",
        version.id,
        format_relative_time(version.created_at_ms)
    );
    if !confirm(&prompt, yes)? {
        println!("Aborted");
        return Ok(());
    }

    archive.remove_version(version.id)?;
    println!("{} version {}", "Removed".red().bold(), version.id.to_string().cyan());
    Ok(())
}

pub fn migrate(
    registry_dir: &Path,
    reference: &str,
    count: Option<usize>,
    all: bool,
    yes: bool,
) -> Result<()> {
    let registry = Registry::open(registry_dir)?;
    let mut archive = open_archive(&registry, reference)?;

    if all {
        let steps = archive.chain().len().saturating_sub(1);
        let prompt = format!("Collapse {steps} version(s) into the latest?");
        if !confirm(&prompt, yes)? {
            println!("Aborted");
            return Ok(());
        }
        let report = archive.migrate_all()?;
        println!(
            "{} {} version(s), {} file(s) moved",
            "Migrated".green().bold(),
            report.steps,
            report.moved_files
        );
        return Ok(());
    }

    let count = count.unwrap_or(1);
    let prompt = format!("Migrate the {count} oldest version(s) forward?");
    if !confirm(&prompt, yes)? {
        println!("Aborted");
        return Ok(());
    }
    for _ in 0..count {
        let report = archive.migrate_oldest()?;
        println!(
            "{} {} into {} ({} file(s) moved)",
            "Migrated".green().bold(),
            report.removed.to_string().cyan(),
            report.new_base.to_string().cyan(),
            report.moved_files
        );
    }
    Ok(())
}

pub fn remove(registry_dir: &Path, reference: &str, yes: bool) -> Result<()> {
    let mut registry = Registry::open(registry_dir)?;
    let archive = open_archive(&registry, reference)?;

    let prompt = format!(
        "Remove archive {} and all {} version(s) at {}?",
        archive.id(),
        archive.chain().len(),
        archive.archive_dir().display()
    );
    if !confirm(&prompt, yes)? {
        println!("Aborted");
        return Ok(());
    }

    let id = archive.id();
    archive.remove(&mut registry)?;
    println!("{} archive {}", "Removed".red().bold(), id.to_string().cyan());
    Ok(())
}
