//! Merge command

use std::path::PathBuf;

use anyhow::{Context, Result};
use apkjoin_core::{Keystore, MergeRequest, MergeSummary, SigningOutcome, default_output_path};
use apkjoin_schema::Role;
use crossterm::style::Stylize;

use super::Settings;

/// Flags of `apkjoin merge`.
#[derive(Debug, Clone)]
pub struct MergeArgs {
    /// Container archive or directory.
    pub input: PathBuf,
    /// Explicit output path.
    pub output: Option<PathBuf>,
    /// Keystore overriding the configured one.
    pub keystore: Option<PathBuf>,
    /// Key alias override.
    pub ks_key_alias: Option<String>,
    /// Password spec override.
    pub ks_pass: Option<String>,
    /// Drop stale v1 signature files.
    pub strip_signatures: bool,
    /// Print JSON instead of the human summary.
    pub json: bool,
}

/// Keystore from the config file, with command-line values taking precedence.
fn resolve_keystore(settings: &Settings, args: &MergeArgs) -> Option<Keystore> {
    let mut keystore = match &args.keystore {
        Some(path) => Some(Keystore {
            path: path.clone(),
            alias: settings.config.signing.key_alias.clone(),
            password: settings.config.signing.keystore_pass.clone(),
        }),
        None => settings.config.keystore(),
    }?;
    if let Some(alias) = &args.ks_key_alias {
        keystore.alias = Some(alias.clone());
    }
    if let Some(pass) = &args.ks_pass {
        keystore.password = Some(pass.clone());
    }
    Some(keystore)
}

/// Merge a split container into one APK
pub async fn merge(settings: &Settings, args: MergeArgs) -> Result<()> {
    let reporter = settings.reporter();
    let pipeline = settings.pipeline(reporter);

    let request = MergeRequest {
        input: args.input.clone(),
        output: args
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&args.input)),
        keystore: resolve_keystore(settings, &args),
        jobs: settings.config.jobs(),
        strip_signatures: args.strip_signatures || settings.config.merge.strip_signatures,
        work_dir: settings.config.merge.work_dir.clone(),
    };

    let summary = pipeline
        .run(request)
        .await
        .with_context(|| format!("Failed to merge {}", args.input.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &MergeSummary) {
    let lw = 12;
    let base = summary.members.iter().find(|m| m.role == Role::Base);

    println!();
    if let Some(base) = base {
        let version = if base.version_name.is_empty() {
            base.version_code.to_string()
        } else {
            base.version_name.clone()
        };
        println!(
            "  {} {}",
            base.package.as_str().white().bold(),
            version.dark_grey()
        );
        if let Some(label) = &base.label {
            println!("  {label}");
        }
        println!();
    }

    let status = if summary.signing.is_signed() {
        "signed".green()
    } else {
        "unsigned".yellow()
    };
    println!("  {:<lw$}{} ({status})", "output", summary.output.display());
    println!("  {:<lw$}{}", "sha256", summary.sha256);

    let count = |role: Role| summary.members.iter().filter(|m| m.role == role).count();
    println!(
        "  {:<lw$}{} ({} split, {} config)",
        "members",
        summary.members.len(),
        count(Role::Split),
        count(Role::Config)
    );
    println!("  {:<lw$}{}", "entries", summary.entries);

    if !summary.dex.is_empty() {
        let dex: Vec<String> = summary
            .dex
            .iter()
            .map(|d| format!("{} <- {}", d.output, d.member))
            .collect();
        println!("  {:<lw$}{}", "dex", dex.join(", "));
    }
    if !summary.conflicts.is_empty() {
        println!("  {:<lw$}{}", "conflicts", summary.conflicts.len());
    }
    if let SigningOutcome::UnsignedFallback { reason, .. } = &summary.signing {
        println!("  {:<lw$}{}", "note", format!("sign before installing ({reason})").dark_grey());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apkjoin_core::Config;

    fn settings(config: Config) -> Settings {
        Settings {
            config,
            config_warning: None,
            quiet: true,
        }
    }

    fn args() -> MergeArgs {
        MergeArgs {
            input: PathBuf::from("game.xapk"),
            output: None,
            keystore: None,
            ks_key_alias: None,
            ks_pass: None,
            strip_signatures: false,
            json: false,
        }
    }

    #[test]
    fn test_no_keystore_anywhere() {
        assert!(resolve_keystore(&settings(Config::default()), &args()).is_none());
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.signing.keystore = Some(PathBuf::from("/cfg.jks"));
        config.signing.key_alias = Some("cfg".to_string());
        config.signing.keystore_pass = Some("env:CFG".to_string());

        let mut a = args();
        a.ks_key_alias = Some("cli".to_string());
        let ks = resolve_keystore(&settings(config.clone()), &a).unwrap();
        assert_eq!(ks.path, PathBuf::from("/cfg.jks"));
        assert_eq!(ks.alias.as_deref(), Some("cli"));
        assert_eq!(ks.password.as_deref(), Some("env:CFG"));

        a.keystore = Some(PathBuf::from("/cli.jks"));
        let ks = resolve_keystore(&settings(config), &a).unwrap();
        assert_eq!(ks.path, PathBuf::from("/cli.jks"));
    }
}
