use crate::cli::{CleanupArgs, RemoteArgs, StatusArgs, SyncAllArgs, SyncArgs, ValidateArgs};
use crate::CliError;
use colored::*;
use repo_context::config::Settings;
use repo_context::error::{MirrorError, Result as MirrorResult};
use repo_context::output::{self, OutputFormat, StatusOutput, SyncEntry, SyncOutput};
use repo_context::sync::{MirrorInfo, SyncAction, SyncOptions, SyncReport, Synchronizer};
use repo_context::vcs::{project_from_url, RepositoryDescriptor, VcsKind};
use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

pub fn sync(
    args: SyncArgs,
    settings: &Settings,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let descriptor = descriptor(&args.remote)?;
    let synchronizer = Synchronizer::new(settings.clone());
    let options = SyncOptions {
        deadline: crate::deadline_from_secs(args.deadline),
    };

    let report = if args.force {
        synchronizer.force_resynchronize_with(&descriptor, &options)?
    } else {
        synchronizer.synchronize_with(&descriptor, &options)?
    };

    print_sync(&[Ok(report)], &[descriptor], format)
}

pub fn sync_all(
    args: SyncAllArgs,
    settings: &Settings,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let descriptors = read_manifest(&args.manifest)?;
    let jobs = if args.jobs == 0 {
        num_cpus::get()
    } else {
        args.jobs
    };
    log::info!(
        "Synchronizing {} repositories with {} jobs",
        descriptors.len(),
        jobs
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| MirrorError::Configuration(format!("could not start workers: {}", e)))?;
    let synchronizer = Synchronizer::new(settings.clone());
    let results =
        pool.install(|| synchronizer.synchronize_many(&descriptors, &SyncOptions::default()));

    let failed = results.iter().filter(|r| r.is_err()).count();
    print_sync(&results, &descriptors, format)?;

    if failed > 0 {
        return Err(Box::new(CliError::Incomplete {
            failed,
            total: descriptors.len(),
        }));
    }
    Ok(())
}

pub fn cleanup(
    args: CleanupArgs,
    settings: &Settings,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let synchronizer = Synchronizer::new(settings.clone());
    let path = synchronizer.local_path(&args.project)?;
    let removed = synchronizer.cleanup(&args.project)?;

    match format {
        OutputFormat::Text if removed => println!("Removed {}", path.display()),
        OutputFormat::Text => {}
        OutputFormat::Json => println!(
            "{}",
            output::json::render(&serde_json::json!({
                "project": args.project,
                "path": path,
                "removed": removed,
            }))?
        ),
        OutputFormat::Xml => {
            let entry = SyncEntry {
                project: args.project.clone(),
                action: None,
                path: Some(path.clone()),
                warning: (!removed).then(|| "not removed".to_string()),
                error: None,
            };
            println!(
                "{}",
                output::xml::render_sync(&SyncOutput {
                    repositories: vec![entry],
                })?
            );
        }
    }

    if !removed {
        return Err(Box::new(CliError::CleanupIncomplete(
            path.display().to_string(),
        )));
    }
    Ok(())
}

pub fn status(
    args: StatusArgs,
    settings: &Settings,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let synchronizer = Synchronizer::new(settings.clone());

    let mirrors = match &args.project {
        Some(project) => {
            let kind: VcsKind = args.kind.parse()?;
            let state = synchronizer.mirror_state(project, kind)?;
            if format == OutputFormat::Text {
                println!("{}: {:?}", project, state);
                return Ok(());
            }
            let path = synchronizer.local_path(project)?;
            vec![MirrorInfo {
                name: project.clone(),
                kind: VcsKind::detect(&path),
                path,
            }]
        }
        None => synchronizer.list_mirrors()?,
    };

    match format {
        OutputFormat::Text => {
            if mirrors.is_empty() {
                println!("No mirrors under {}", settings.base_path.display());
            }
            for mirror in &mirrors {
                let kind = mirror
                    .kind
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "invalid".red().to_string());
                println!("{:<8} {}", kind, mirror.name);
            }
        }
        OutputFormat::Json | OutputFormat::Xml => {
            let data = StatusOutput {
                base_path: settings.base_path.clone(),
                mirrors,
            };
            let doc = match format {
                OutputFormat::Json => output::json::render(&data)?,
                _ => output::xml::render_status(&data)?,
            };
            println!("{}", doc);
        }
    }

    Ok(())
}

pub fn validate(args: ValidateArgs, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let kind: VcsKind = args.kind.parse()?;
    Synchronizer::new(settings.clone()).validate_remote(&args.url, kind)?;
    println!("{} is a reachable {} repository", args.url, kind);
    Ok(())
}

pub(crate) fn descriptor(remote: &RemoteArgs) -> MirrorResult<RepositoryDescriptor> {
    let kind: VcsKind = remote.kind.parse()?;
    let project = match &remote.project {
        Some(project) => project.clone(),
        None => project_from_url(&remote.url).ok_or_else(|| {
            MirrorError::Validation(format!(
                "cannot derive a project name from '{}'; pass --project",
                remote.url
            ))
        })?,
    };
    Ok(RepositoryDescriptor::new(remote.url.clone(), kind, project))
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    repository: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    url: String,
    #[serde(default = "default_kind")]
    kind: VcsKind,
    project: Option<String>,
}

fn default_kind() -> VcsKind {
    VcsKind::Git
}

fn parse_manifest(content: &str) -> MirrorResult<Vec<RepositoryDescriptor>> {
    let manifest: Manifest = toml::from_str(content)
        .map_err(|e| MirrorError::Configuration(format!("invalid manifest: {}", e)))?;

    manifest
        .repository
        .into_iter()
        .map(|entry| {
            let project = entry
                .project
                .or_else(|| project_from_url(&entry.url))
                .ok_or_else(|| {
                    MirrorError::Configuration(format!("no project name for {}", entry.url))
                })?;
            Ok(RepositoryDescriptor::new(entry.url, entry.kind, project))
        })
        .collect()
}

fn read_manifest(path: &Path) -> MirrorResult<Vec<RepositoryDescriptor>> {
    let content = fs::read_to_string(path).map_err(|e| MirrorError::fs("read", path, e))?;
    parse_manifest(&content)
}

fn print_sync(
    results: &[MirrorResult<SyncReport>],
    descriptors: &[RepositoryDescriptor],
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    if format == OutputFormat::Text {
        for (result, descriptor) in results.iter().zip(descriptors) {
            match result {
                Ok(report) => print_report_text(report),
                Err(e) => eprintln!(
                    "{} {}: {}",
                    "failed".red().bold(),
                    descriptor.project,
                    e
                ),
            }
        }
        return Ok(());
    }

    let repositories = results
        .iter()
        .zip(descriptors)
        .map(|(result, descriptor)| match result {
            Ok(report) => SyncEntry {
                project: report.project.clone(),
                action: Some(report.action),
                path: Some(report.path.clone()),
                warning: report.warning.clone(),
                error: None,
            },
            Err(e) => SyncEntry {
                project: descriptor.project.clone(),
                action: None,
                path: None,
                warning: None,
                error: Some(e.report()),
            },
        })
        .collect();
    let data = SyncOutput { repositories };

    let doc = match format {
        OutputFormat::Json => output::json::render(&data)?,
        _ => output::xml::render_sync(&data)?,
    };
    println!("{}", doc);
    Ok(())
}

fn print_report_text(report: &SyncReport) {
    let action = match report.action {
        SyncAction::Stale => report.action.to_string().yellow().bold().to_string(),
        _ => report.action.to_string().green().to_string(),
    };
    println!("{:<8} {} {}", action, report.project, report.path.display());
    if let Some(warning) = &report.warning {
        eprintln!("{} {}", "warning:".yellow(), warning);
    }
}
