use crate::cli::{ContextArgs, FilesArgs, RankArgs, SummaryArgs};
use colored::*;
use repo_context::config::Settings;
use repo_context::output::{
    self, FileOutput, FilesOutput, OutputFormat, RankOutput, RankedOutput, SummaryOutput,
};
use repo_context::ranker::{extract_keywords, ScoredFile};
use repo_context::summary::{human_bytes, render_tree};
use repo_context::sync::Synchronizer;
use std::error::Error;

pub fn files(
    args: FilesArgs,
    settings: &Settings,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let catalog = Synchronizer::new(settings.clone()).catalog(&args.project)?;
    let files: Vec<FileOutput> = catalog
        .entries(&args.extensions)
        .map(|entry| FileOutput {
            path: entry.relative,
            size: entry.size,
        })
        .collect();

    match format {
        OutputFormat::Text if args.flat => {
            for file in &files {
                println!("{:>9}  {}", human_bytes(file.size), file.path);
            }
        }
        OutputFormat::Text => {
            let tree = render_tree(
                files
                    .iter()
                    .map(|f| (f.path.as_str(), Some(format!("{:>9}", human_bytes(f.size))))),
                args.no_color,
            );
            print!("{}", tree);
        }
        OutputFormat::Json | OutputFormat::Xml => {
            let data = FilesOutput {
                project: args.project,
                files,
            };
            let doc = match format {
                OutputFormat::Json => output::json::render(&data)?,
                _ => output::xml::render_files(&data)?,
            };
            println!("{}", doc);
        }
    }

    Ok(())
}

pub fn rank(
    args: RankArgs,
    settings: &Settings,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let synchronizer = Synchronizer::new(settings.clone());
    let mut options = synchronizer.rank_options();
    if let Some(top_k) = args.top_k {
        options.top_k = top_k;
    }
    if let Some(max) = args.max_candidates {
        options.max_candidates = max;
    }
    options.extensions = args.extensions.clone();

    let ranked = synchronizer.find_relevant(&args.project, &args.query, Some(options))?;

    match format {
        OutputFormat::Text => {
            if ranked.is_empty() {
                eprintln!("No files matched {:?}", args.query);
            }
            for file in &ranked {
                print_ranked(file, args.no_color);
            }
        }
        OutputFormat::Json | OutputFormat::Xml => {
            let data = RankOutput {
                project: args.project,
                keywords: extract_keywords(&args.query),
                query: args.query,
                files: ranked
                    .into_iter()
                    .map(|f| RankedOutput {
                        path: f.path,
                        score: f.score,
                        reason: f.reason,
                    })
                    .collect(),
            };
            let doc = match format {
                OutputFormat::Json => output::json::render(&data)?,
                _ => output::xml::render_ranking(&data)?,
            };
            println!("{}", doc);
        }
    }

    Ok(())
}

fn print_ranked(file: &ScoredFile, no_color: bool) {
    let score = format!("{:4}", file.score);
    let score = if no_color {
        score
    } else if file.score >= 10 {
        score.green().bold().to_string()
    } else {
        score.yellow().to_string()
    };
    println!("{} {}  ({})", score, file.path, file.reason);
}

pub fn summary(
    args: SummaryArgs,
    settings: &Settings,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let summary = Synchronizer::new(settings.clone()).summarize(&args.project)?;

    match format {
        OutputFormat::Text => print!("{}", summary.render()),
        OutputFormat::Json | OutputFormat::Xml => {
            let data = SummaryOutput {
                project: args.project,
                summary,
            };
            let doc = match format {
                OutputFormat::Json => output::json::render(&data)?,
                _ => output::xml::render_summary(&data)?,
            };
            println!("{}", doc);
        }
    }

    Ok(())
}

pub fn context(
    args: ContextArgs,
    settings: &Settings,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let descriptor = crate::mirror_cmd::descriptor(&args.remote)?;
    let synchronizer = Synchronizer::new(settings.clone());

    let mut options = synchronizer.context_options();
    if let Some(top_k) = args.top_k {
        options.rank.top_k = top_k;
    }
    options.rank.deadline = crate::deadline_from_secs(args.deadline);
    options.count_tokens = args.tokens;

    let bundle = synchronizer.prepare_context(&descriptor, &args.query, Some(options))?;

    match format {
        OutputFormat::Text => {
            print!("{}", bundle.render());
            println!("\n# Total lines: {}", bundle.total_lines());
            if let Some(tokens) = bundle.total_tokens().filter(|_| args.tokens) {
                println!("# Total tokens: {}", tokens);
            }
        }
        OutputFormat::Json => println!("{}", output::json::render(&bundle)?),
        OutputFormat::Xml => println!("{}", output::xml::render_bundle(&bundle)?),
    }

    Ok(())
}
