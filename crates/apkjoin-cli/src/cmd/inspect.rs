//! Inspect command

use std::path::Path;

use anyhow::{Context, Result, bail};
use apkjoin_core::Inspection;
use apkjoin_schema::{ComponentKind, ManifestDescriptor, PackageMember};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{ContentArrangement, Table};
use crossterm::style::Stylize;

use super::Settings;
use crate::ui::theme::format_size;

/// Classify and validate a container, then describe it
pub async fn inspect(settings: &Settings, input: &Path, json: bool) -> Result<()> {
    let reporter = settings.reporter();
    let pipeline = settings.pipeline(reporter);

    let inspection = pipeline
        .inspect(
            input,
            settings.config.jobs(),
            settings.config.merge.work_dir.as_deref(),
        )
        .await
        .with_context(|| format!("Failed to inspect {}", input.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
    } else {
        print_inspection(&inspection);
    }

    if let Some(problem) = &inspection.problem {
        bail!("{} cannot be merged: {problem}", input.display());
    }
    Ok(())
}

fn member_table(members: &[PackageMember]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "File", "Role", "Split", "Decided", "Package", "Version", "ABIs", "Size",
        ]);
    for m in members {
        table.add_row(vec![
            m.file_name.clone(),
            m.role.to_string(),
            m.split_name.clone(),
            m.confidence.to_string(),
            m.package.to_string(),
            m.version_code.to_string(),
            m.architectures.join(" "),
            format_size(m.size_bytes),
        ]);
    }
    table
}

fn print_manifest(manifest: &ManifestDescriptor) {
    let lw = 14;
    println!();
    println!(
        "  {} {}",
        manifest.package.as_str().white().bold(),
        manifest
            .version_name
            .as_deref()
            .unwrap_or_default()
            .dark_grey()
    );
    println!();
    if let Some(min) = &manifest.min_sdk {
        println!("  {:<lw$}{min}", "min sdk");
    }
    if let Some(target) = &manifest.target_sdk {
        println!("  {:<lw$}{target}", "target sdk");
    }
    for (key, value) in &manifest.application {
        println!("  {key:<lw$}{value}");
    }
    if manifest.has_no_code() {
        println!("  {:<lw$}{}", "code", "none (hasCode=false)".dark_grey());
    }
    if !manifest.permissions.is_empty() {
        println!("  {:<lw$}{}", "permissions", manifest.permissions.len());
    }
    if !manifest.features.is_empty() {
        println!("  {:<lw$}{}", "features", manifest.features.join(", "));
    }
    let components: Vec<String> = [
        ComponentKind::Activity,
        ComponentKind::ActivityAlias,
        ComponentKind::Service,
        ComponentKind::Receiver,
        ComponentKind::Provider,
    ]
    .into_iter()
    .filter_map(|kind| match manifest.count(kind) {
        0 => None,
        n => Some(format!("{n} {}", kind.as_str())),
    })
    .collect();
    if !components.is_empty() {
        println!("  {:<lw$}{}", "components", components.join(", "));
    }
}

fn print_inspection(inspection: &Inspection) {
    if let Some(manifest) = &inspection.manifest {
        print_manifest(manifest);
    }

    println!();
    println!("{}", member_table(&inspection.members));

    if let Some(container) = &inspection.container {
        if !container.expansions.is_empty() {
            println!();
            println!("  {}", "expansion files (not merged)".dark_grey());
            for expansion in &container.expansions {
                println!("  {}", expansion.file);
            }
        }
    }

    match &inspection.problem {
        Some(problem) => println!("\n  {} {problem}", "✗".red()),
        None => println!("\n  {} ready to merge", "✓".green()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apkjoin_schema::{Confidence, MetadataSource, PackageName, Role, VersionCode};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    #[test]
    fn test_member_table_has_one_row_per_member() {
        let member = PackageMember {
            path: PathBuf::from("base.apk"),
            file_name: "base.apk".to_string(),
            size_bytes: 10,
            package: PackageName::new("com.example.game"),
            version_name: "1.4.2".to_string(),
            version_code: VersionCode::new(42),
            min_sdk: None,
            target_sdk: None,
            label: None,
            permissions: BTreeSet::new(),
            features: BTreeSet::new(),
            architectures: vec!["arm64-v8a".to_string(), "x86_64".to_string()],
            role: Role::Base,
            split_name: String::new(),
            confidence: Confidence::Convention,
            source: MetadataSource::Badging,
            warnings: Vec::new(),
        };
        let table = member_table(&[member.clone(), member]);
        assert_eq!(table.row_iter().count(), 2);
        let rendered = table.to_string();
        assert!(rendered.contains("com.example.game"));
        assert!(rendered.contains("arm64-v8a x86_64"));
    }
}
