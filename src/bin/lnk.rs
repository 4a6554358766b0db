// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use lnk::{
    config::Settings,
    path::{absolutize, default_repo_dir, default_settings_path, home_dir},
    Git, Manager, ManagerError, Profile,
};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    io::{stdout, IsTerminal},
    path::PathBuf,
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "lnk [options] <lnk-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Show debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let context = Context::load()?;
        match self.command {
            Command::Init(opts) => run_init(&context, opts),
            Command::Add(opts) => run_add(&context, opts),
            Command::Rm(opts) => run_rm(&context, opts),
            Command::List(opts) => run_list(&context, opts),
            Command::Status => run_status(&context),
            Command::Diff(opts) => run_diff(&context, opts),
            Command::Push(opts) => run_push(&context, opts),
            Command::Pull(opts) => run_pull(&context, opts),
            Command::Bootstrap => run_bootstrap(&context),
            Command::Doctor(opts) => run_doctor(&context, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Initialize new repository, or clone one from a remote.
    #[command(override_usage = "lnk init [options]")]
    Init(InitOptions),

    /// Move files into repository, and symlink them back.
    #[command(override_usage = "lnk add [options] <path>...")]
    Add(AddOptions),

    /// Move files out of repository, replacing their symlinks.
    #[command(override_usage = "lnk rm [options] <path>...")]
    Rm(RmOptions),

    /// List managed files.
    #[command(override_usage = "lnk list [options]")]
    List(ListOptions),

    /// Show synchronization state of repository.
    Status,

    /// Show uncommitted changes of repository.
    #[command(override_usage = "lnk diff [options]")]
    Diff(DiffOptions),

    /// Commit pending changes, and push them to remote.
    #[command(override_usage = "lnk push [message]")]
    Push(PushOptions),

    /// Pull changes from remote, and restore symlinks.
    #[command(override_usage = "lnk pull [options]")]
    Pull(HostOptions),

    /// Run bootstrap script of repository.
    Bootstrap,

    /// Find and fix drift between tracking, repository, and home.
    #[command(override_usage = "lnk doctor [options]")]
    Doctor(DoctorOptions),
}

#[derive(Args, Clone, Debug)]
struct HostOptions {
    /// Use host profile instead of the common one.
    #[arg(long, value_name = "host")]
    pub host: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// URL of remote to clone repository from.
    #[arg(short, long, value_name = "url")]
    pub remote: Option<String>,

    /// Replace existing repository even if it manages files.
    #[arg(long)]
    pub force: bool,

    /// Do not run bootstrap script after cloning.
    #[arg(long)]
    pub no_bootstrap: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    #[command(flatten)]
    pub host: HostOptions,

    /// Add every file inside of given directories.
    #[arg(short, long)]
    pub recursive: bool,

    /// Only show what would be added.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Paths to bring under management.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RmOptions {
    #[command(flatten)]
    pub host: HostOptions,

    /// Stop managing files whose symlinks are already gone.
    #[arg(short, long)]
    pub force: bool,

    /// Paths to stop managing.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    #[command(flatten)]
    pub host: HostOptions,

    /// List files of every profile.
    #[arg(short, long, conflicts_with = "host")]
    pub all: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DiffOptions {
    /// Never colorize output.
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PushOptions {
    /// Commit message for pending changes.
    #[arg(value_name = "message", default_value = "lnk: sync configuration files")]
    pub message: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DoctorOptions {
    #[command(flatten)]
    pub host: HostOptions,

    /// Only report problems without fixing them.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Machine-specific state every command starts from.
struct Context {
    settings: Settings,
    repo_root: PathBuf,
    home_dir: PathBuf,
}

impl Context {
    fn load() -> Result<Self> {
        let settings = Settings::load(default_settings_path())?;
        let repo_root = absolutize(
            settings
                .repository
                .clone()
                .unwrap_or_else(default_repo_dir),
        )?;

        Ok(Self {
            settings,
            repo_root,
            home_dir: home_dir()?,
        })
    }

    fn profile(&self, host: Option<&str>) -> Result<Profile> {
        match host.or(self.settings.host.as_deref()) {
            Some(host) => Ok(Profile::host(host)?),
            None => Ok(Profile::common()),
        }
    }

    fn manager(&self, profile: Profile) -> Manager {
        let vcs = Git::new(&self.repo_root).with_remote(&self.settings.remote);
        Manager::with_vcs(&self.repo_root, &self.home_dir, profile, vcs)
            .with_remote(&self.settings.remote)
            .with_bootstrap_script(&self.settings.bootstrap)
    }

    fn manager_for(&self, opts: &HostOptions) -> Result<Manager> {
        Ok(self.manager(self.profile(opts.host.as_deref())?))
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        if let Some(hint) = error.downcast_ref::<ManagerError>().and_then(ManagerError::hint) {
            info!("hint: {hint}");
        }
        exit(1);
    }

    exit(0)
}

fn run_init(context: &Context, opts: InitOptions) -> Result<()> {
    let manager = context.manager(context.profile(None)?);
    let Some(url) = opts.remote else {
        manager.init()?;
        info!("initialized {:?}", manager.repo_root().display());
        return Ok(());
    };

    manager.init_with_remote(&url, opts.force)?;
    info!("cloned {url} into {:?}", manager.repo_root().display());

    if opts.no_bootstrap {
        return Ok(());
    }

    if let Some(script) = manager.find_bootstrap() {
        info!("found bootstrap script {:?}", script.display());
        manager.run_bootstrap()?;
    }

    Ok(())
}

fn run_add(context: &Context, opts: AddOptions) -> Result<()> {
    let manager = context.manager_for(&opts.host)?;

    if opts.dry_run {
        for path in manager.preview_add(&opts.paths, opts.recursive)? {
            println!("would add {}", path.display());
        }
        return Ok(());
    }

    if !opts.recursive {
        return match opts.paths.as_slice() {
            [path] => Ok(manager.add(path)?),
            paths => Ok(manager.add_multiple(paths, None)?),
        };
    }

    let bar = progress_bar()?;
    let mut report = |current: usize, total: usize, name: &str| {
        bar.set_length(total as u64);
        bar.set_position(current as u64);
        bar.set_message(name.to_string());
    };
    let result = manager.add_recursive(&opts.paths, Some(&mut report));
    bar.finish_and_clear();

    Ok(result?)
}

fn run_rm(context: &Context, opts: RmOptions) -> Result<()> {
    let manager = context.manager_for(&opts.host)?;
    for path in &opts.paths {
        if opts.force {
            manager.remove_force(path)?;
        } else {
            manager.remove(path)?;
        }
    }

    Ok(())
}

fn run_list(context: &Context, opts: ListOptions) -> Result<()> {
    if !opts.all {
        for entry in context.manager_for(&opts.host)?.list()? {
            println!("{entry}");
        }
        return Ok(());
    }

    let profiles = context.manager(Profile::common()).list_profiles()?;
    if profiles.is_empty() {
        warn!("nothing managed yet");
    }

    for profile in profiles {
        println!("{profile}:");
        for entry in context.manager(profile).list()? {
            println!("  {entry}");
        }
    }

    Ok(())
}

fn run_status(context: &Context) -> Result<()> {
    let status = context.manager(context.profile(None)?).status()?;
    match status.remote {
        Some(remote) if status.ahead == 0 && status.behind == 0 => {
            println!("up to date with {remote}")
        }
        Some(remote) => println!(
            "{} ahead, {} behind {remote}",
            status.ahead, status.behind
        ),
        None => println!("no upstream configured"),
    }

    if status.dirty {
        println!("uncommitted changes present");
    }

    Ok(())
}

fn run_diff(context: &Context, opts: DiffOptions) -> Result<()> {
    let color = !opts.no_color && stdout().is_terminal();
    print!("{}", context.manager(context.profile(None)?).diff(color)?);
    Ok(())
}

fn run_push(context: &Context, opts: PushOptions) -> Result<()> {
    context.manager(context.profile(None)?).push(&opts.message)?;
    info!("pushed to {}", context.settings.remote);
    Ok(())
}

fn run_pull(context: &Context, opts: HostOptions) -> Result<()> {
    let restored = context.manager_for(&opts)?.pull()?;
    if restored.is_empty() {
        info!("all symlinks in place");
    } else {
        info!("restored {} symlink(s)", restored.len());
    }

    Ok(())
}

fn run_bootstrap(context: &Context) -> Result<()> {
    context.manager(context.profile(None)?).run_bootstrap()?;
    Ok(())
}

fn run_doctor(context: &Context, opts: DoctorOptions) -> Result<()> {
    let manager = context.manager_for(&opts.host)?;
    let report = if opts.dry_run {
        manager.doctor_preview()?
    } else {
        manager.doctor_fix()?
    };
    print!("{report}");

    if !opts.dry_run && !report.is_healthy() {
        let fixed = report.invalid_entries.len() + report.broken_symlinks.len();
        info!("fixed {fixed} problem(s)");
    }

    Ok(())
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<30}  [{wide_bar:.yellow/blue}] {pos}/{len}",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    Ok(bar)
}
