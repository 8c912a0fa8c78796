// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use clap_verbosity_flag::Verbosity;
use indicatif::{ProgressBar, ProgressStyle};

use cratemirror::catalog::HttpCatalogClient;
use cratemirror::resolver::{self, RequirementSlot, Worklist};
use cratemirror::{state, MirrorBuilder, RegistryConfig};

mod gitops;
mod logging;
mod progress;

use progress::SuspendableBars;

#[derive(Parser, Debug)]
#[clap(version, about = "Build a curated mirror of a crates.io-shaped package index")]
struct Cli {
    /// Path to the TOML configuration file.
    #[clap(short = 'C', long, default_value = "cratemirror.toml")]
    config: PathBuf,

    #[clap(flatten)]
    verbose: Verbosity,

    /// Force rebuild of the seed (re-fetch top lists) before resolving.
    #[clap(short, long)]
    download: bool,

    /// Update the upstream on-disk index (external git operation).
    #[clap(short, long)]
    update: bool,

    /// Remove unused archives.
    #[clap(short, long)]
    purge: bool,

    /// Write to the git-registry output tree instead of the local-registry tree.
    #[clap(short, long = "git-registry")]
    git_registry: bool,

    /// Commit and push the resulting index tree.
    #[clap(short, long)]
    commit: bool,

    /// Debug: seed one requirement and run one resolver iteration.
    #[clap(short = 't', long = "test", value_names = &["NAME", "VERSION"], number_of_values = 2)]
    test: Option<Vec<String>>,
}

const WORKLIST_SNAPSHOT: &str = "crates.json";
const CATALOG_SNAPSHOT: &str = "selected_crates.json";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let bars = SuspendableBars::new();
    logging::setup(cli.verbose.log_level_filter(), bars.clone());

    let config_path = canonicalize(&cli.config).with_context(|| {
        format!("could not resolve configuration file path '{}'", cli.config.display())
    })?;
    let config = RegistryConfig::load(&config_path)
        .with_context(|| format!("invalid configuration file '{}'", config_path.display()))?;

    if cli.update {
        gitops::update(&config)?;
    }

    let mut builder: MirrorBuilder<ProgressBar> = MirrorBuilder::new(config)
        .context("failed to initialize mirror builder from configuration")?;

    let start_bars = bars.clone();
    builder.with_progress_spinner(move |msg| {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(msg);
        bar.enable_steady_tick(Duration::from_millis(100));
        start_bars.with_bar(bar)
    });
    builder.with_progress_finish(|bar| bar.finish_and_clear());

    if let Some(values) = cli.test {
        let [name, version] = <[String; 2]>::try_from(values)
            .map_err(|_| anyhow::anyhow!("-t/--test requires exactly a NAME and a VERSION"))?;
        return run_debug_probe(&builder, &name, &version);
    }

    let client = HttpCatalogClient::new(builder.config().catalog_url.clone())
        .context("failed to build catalog HTTP client")?;

    let worklist_path = PathBuf::from(WORKLIST_SNAPSHOT);
    let worklist = if cli.download || !worklist_path.is_file() {
        let worklist = builder.seed(&client)?;
        state::save_worklist(&worklist, &worklist_path)
            .with_context(|| format!("failed to write {}", worklist_path.display()))?;
        worklist
    } else {
        state::load_worklist(&worklist_path)
            .with_context(|| format!("failed to read {}", worklist_path.display()))?
    };

    let outcome = builder.resolve(worklist);
    if outcome.iteration_budget_exceeded {
        log::warn!("resolver hit its iteration budget; the mirror below is a partial result");
    }

    let catalog_path = PathBuf::from(CATALOG_SNAPSHOT);
    state::save_catalog(&outcome.seen, &catalog_path)
        .with_context(|| format!("failed to write {}", catalog_path.display()))?;

    builder
        .materialize(&outcome.seen, cli.git_registry)
        .context("failed to materialize the pruned index tree")?;

    if cli.git_registry {
        gitops::status(builder.config(), cli.git_registry)?;
    }

    let progress_bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("{bar:40} {pos}/{len} archives fetched")
    {
        progress_bar.set_style(style);
    }
    let progress_bar = bars.with_bar(progress_bar);
    let summary = builder
        .fetch(&outcome.seen, cli.purge, {
            let progress_bar = progress_bar.clone();
            move |done, total| {
                progress_bar.set_length(total);
                progress_bar.set_position(done);
            }
        })
        .context("failed to fetch archives")?;
    progress_bar.finish_and_clear();

    log::info!(
        "fetch complete: {} downloaded, {} failed, {} unused, {} purged",
        summary.downloaded,
        summary.failed,
        summary.unused.len(),
        summary.purged
    );
    if summary.failed > 0 {
        bail!("{} archive(s) failed to download", summary.failed);
    }

    if cli.commit {
        gitops::commit(builder.config(), cli.git_registry)?;
    }

    Ok(())
}

/// `-t / --test`: seed a single requirement and run one resolver pass
/// against it, printing the resulting `seen` set without touching the
/// persisted state, output trees, or archives.
fn run_debug_probe(builder: &MirrorBuilder<ProgressBar>, name: &str, version: &str) -> Result<()> {
    let mut worklist = Worklist::new();
    let package = name
        .parse()
        .map_err(|err| anyhow::anyhow!("invalid package name {name:?}: {err}"))?;
    resolver::enqueue(&mut worklist, package, RequirementSlot::Req(version.to_string()));

    let outcome = builder.resolve(worklist);
    for (name, vers) in &outcome.seen {
        println!("{name} {vers}");
    }
    if outcome.iteration_budget_exceeded {
        log::warn!("resolver hit its iteration budget during the debug probe");
    }
    Ok(())
}

/// Resolve symlinks and UNC prefixes before handing a path to `RegistryConfig`.
fn canonicalize<P: AsRef<std::path::Path>>(path: P) -> Result<PathBuf> {
    Ok(dunce::canonicalize(path)?)
}
