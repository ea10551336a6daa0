use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use common::{
    DirectorySession, LinkKind, Reporter, Summary, TransferConfig, fsops, metadata, replicate,
    transfer, walk,
};
use tracing::instrument;

mod path;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rafc",
    version,
    about = "List, fetch, upload and replicate files on a device filesystem",
    long_about = "`rafc` is a client for a remote file-access service. It lists remote trees, moves single \
files in either direction and replicates whole subtrees to local disk.

EXAMPLE:
    # Mirror the Documents tree into ./backup and remove the copied files on the device
    rafc --root /mnt/device --clean clone Documents ./backup

    # Fetch one file into the current directory
    rafc --root /mnt/device get Documents/notes.txt"
)]
struct Args {
    // Session
    /// Directory served as the remote filesystem
    #[arg(
        long,
        env = "RAFC_ROOT",
        value_name = "DIR",
        global = true,
        help_heading = "Session"
    )]
    root: Option<std::path::PathBuf>,

    // Transfer options
    /// Remove each remote file after it was transferred by clone or export
    #[arg(short = 'c', long = "clean", global = true, help_heading = "Transfer options")]
    clean: bool,

    // Progress & output
    /// Toggles the type of progress to show
    ///
    /// Options are: `ProgressBar` (animated progress bar), `TextUpdates` (appropriate for logging), Auto (default, will
    /// choose between `ProgressBar` or `TextUpdates` depending on the type of terminal attached to stderr)
    #[arg(
        long,
        value_name = "TYPE",
        global = true,
        help_heading = "Progress & output"
    )]
    progress_type: Option<common::ProgressType>,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, global = true, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, don't show progress; errors are still reported
    #[arg(short = 'q', long = "quiet", global = true, help_heading = "Progress & output")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// List directory contents, or describe a file
    #[command(visible_alias = "list")]
    Ls {
        /// Descend into subdirectories
        #[arg(short = 'R', long)]
        recursive: bool,
        /// Print entries as a JSON array
        #[arg(long)]
        json: bool,
        /// Remote paths, the top level when none are given
        paths: Vec<String>,
    },
    /// Show the metadata of remote paths
    Info {
        /// Print entries as a JSON array
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Create remote directories, including missing parents
    Mkdir {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Remove remote files, links or empty directories
    #[command(visible_alias = "remove")]
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Rename a remote path
    Rename { from: String, to: String },
    /// Create a remote hard link
    #[command(visible_alias = "hardlink")]
    Link { target: String, link: String },
    /// Create a remote symbolic link
    Symlink { target: String, link: String },
    /// Write a remote file to stdout
    Cat { path: String },
    /// Download one file; to ./<name> unless a local path is given
    Get {
        path: String,
        local: Option<std::path::PathBuf>,
    },
    /// Upload one file; to the top level under its own name unless a remote path is given
    Put {
        local: std::path::PathBuf,
        path: Option<String>,
    },
    /// Mirror a remote tree under a local directory
    Clone {
        path: String,
        local: std::path::PathBuf,
    },
    /// Copy the files directly inside a remote directory into a local directory
    Export {
        path: String,
        local: std::path::PathBuf,
    },
}

/// Attempt `op` on every path; the result fails if any path failed.
fn for_each_path<F>(what: &str, paths: &[String], mut op: F) -> Result<Summary>
where
    F: FnMut(&str) -> Result<Summary>,
{
    let mut summary = Summary::default();
    let mut failed = 0;
    for path in paths {
        match op(path) {
            Ok(path_summary) => summary = summary + path_summary,
            Err(error) => {
                tracing::error!("{}", &error);
                summary.entries_failed += 1;
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(anyhow!(
            "{what}: {failed} of {} paths failed",
            paths.len()
        ));
    }
    Ok(summary)
}

fn list(
    session: &mut DirectorySession,
    paths: &[String],
    recursive: bool,
    json: bool,
    reporter: &mut Reporter,
) -> Result<Summary> {
    let now = chrono::Local::now();
    let mut listed = vec![];
    let outcome = for_each_path("ls", paths, |path| {
        let (entries, outcome) = match walk::enumerate(session, path, recursive) {
            Ok(entries) => (entries, Ok(Summary::default())),
            Err(walk::Error { source, entries }) => (entries, Err(anyhow::Error::new(source))),
        };
        if !json {
            for entry in &entries {
                reporter.message(&metadata::long_listing(entry, &now));
            }
        }
        listed.extend(entries);
        outcome
    });
    if json {
        reporter.message(&serde_json::to_string_pretty(&listed)?);
    }
    outcome
}

fn info(
    session: &mut DirectorySession,
    paths: &[String],
    json: bool,
    reporter: &mut Reporter,
) -> Result<Summary> {
    let now = chrono::Local::now();
    let mut described = vec![];
    let outcome = for_each_path("info", paths, |path| {
        let entry = metadata::fetch(session, path)?;
        if !json {
            reporter.message(&metadata::long_listing(&entry, &now));
        }
        described.push(entry);
        Ok(Summary::default())
    });
    if json {
        reporter.message(&serde_json::to_string_pretty(&described)?);
    }
    outcome
}

fn dispatch(
    session: &mut DirectorySession,
    command: Command,
    settings: &TransferConfig,
    reporter: &mut Reporter,
) -> Result<Summary> {
    match command {
        Command::Ls {
            recursive,
            json,
            paths,
        } => {
            let paths = if paths.is_empty() {
                vec![String::new()]
            } else {
                paths
            };
            list(session, &paths, recursive, json, reporter)
        }
        Command::Info { json, paths } => info(session, &paths, json, reporter),
        Command::Mkdir { paths } => for_each_path("mkdir", &paths, |path| {
            fsops::make_directory(session, path, reporter)?;
            Ok(Summary {
                directories_created: 1,
                ..Default::default()
            })
        }),
        Command::Rm { paths } => for_each_path("rm", &paths, |path| {
            fsops::remove(session, path, reporter)?;
            Ok(Summary {
                files_removed: 1,
                ..Default::default()
            })
        }),
        Command::Rename { from, to } => {
            fsops::rename(session, &from, &to, reporter)?;
            Ok(Summary::default())
        }
        Command::Link { target, link } => {
            fsops::link(session, LinkKind::Hard, &target, &link, reporter)?;
            Ok(Summary::default())
        }
        Command::Symlink { target, link } => {
            fsops::link(session, LinkKind::Symbolic, &target, &link, reporter)?;
            Ok(Summary::default())
        }
        Command::Get { path, local } => {
            let local = path::get_destination(&path, local.as_deref())?;
            let bytes = transfer::get(session, &path, &local, reporter)?;
            Ok(Summary {
                bytes_transferred: bytes,
                files_transferred: 1,
                ..Default::default()
            })
        }
        Command::Put { local, path } => {
            let remote = path::put_destination(&local, path.as_deref())?;
            let bytes = transfer::upload(session, &local, &remote, reporter)?;
            Ok(Summary {
                bytes_transferred: bytes,
                files_transferred: 1,
                ..Default::default()
            })
        }
        Command::Cat { path } => {
            let bytes = transfer::cat(session, &path, reporter.sink())?;
            Ok(Summary {
                bytes_transferred: bytes,
                files_transferred: 1,
                ..Default::default()
            })
        }
        Command::Clone { path, local } => {
            replicate::clone(session, &path, &local, settings, reporter).map_err(Into::into)
        }
        Command::Export { path, local } => {
            replicate::export(session, &path, &local, settings, reporter).map_err(Into::into)
        }
    }
}

#[instrument(skip(args))]
fn run_command(args: Args) -> Result<Summary> {
    let root = args
        .root
        .ok_or_else(|| anyhow!("no session root given, use --root or set RAFC_ROOT"))?;
    let mut session = DirectorySession::open(&root)?;
    let mut out = std::io::stdout().lock();
    let settings = TransferConfig {
        cleanup: args.clean,
        progress_type: args.progress_type.unwrap_or_default(),
    };
    let mut reporter = Reporter::new(&mut out, args.quiet, settings.progress_type);
    dispatch(&mut session, args.command, &settings, &mut reporter)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let func = {
        let args = args.clone();
        || run_command(args)
    };
    let res = common::run(&output, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
