//! drift: command-line interface over the drift core.
//!
//! # Usage
//!
//! ```bash
//! drift init
//! drift add <path>...
//! drift commit -m "message"
//! drift status
//! drift checkout <branch|commit>
//! drift merge <branch>
//! drift clone <src> <dest>
//! drift push tcp://host[:port] [branch]
//! drift pull <remote> [name]
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drift_core::{ChangeKind, Identity, MergeOutcome, Repository, Status};

#[derive(Parser, Debug)]
#[command(name = "drift")]
#[command(version = "0.1.0")]
#[command(about = "A minimal distributed version-control system")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a new repository in the current directory
    Init {
        /// Committer name recorded in the repository config
        #[arg(long, default_value = "Your Name")]
        name: String,
        /// Committer email recorded in the repository config
        #[arg(long, default_value = "you@example.com")]
        email: String,
    },

    /// Add file(s) to the index
    Add {
        /// Repo-relative paths to stage
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Remove file(s) from the index
    Unstage {
        /// Repo-relative paths to unstage
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Commit staged changes
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Show staged, unstaged, and untracked changes
    Status,

    /// Switch to a branch or a 40-hex commit
    Checkout { target: String },

    /// Create a branch at the current HEAD commit
    Branch { name: String },

    /// Show the commit log from HEAD
    Log {
        /// Limit the number of commits shown
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Merge a branch into the current branch
    Merge { branch: String },

    /// Show unified diffs (working vs index, or --cached for index vs HEAD)
    Diff {
        #[arg(long)]
        cached: bool,
    },

    /// Clone a repository from a path or tcp://host[:port]
    Clone { src: String, dest: PathBuf },

    /// Push a branch to a remote, fast-forward only
    Push {
        remote: String,
        /// Branch to push; defaults to the current branch
        branch: Option<String>,
    },

    /// Fetch a remote head into refs/remotes/<name>/
    Fetch {
        remote: String,
        #[arg(default_value = "origin")]
        name: String,
    },

    /// Fetch and integrate: fast-forward or merge
    Pull {
        remote: String,
        #[arg(default_value = "origin")]
        name: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let repo = Repository::open(&cwd);

    match cli.command {
        Commands::Init { name, email } => {
            repo.init(&Identity { name, email })
                .context("init failed")?;
            println!(
                "Initialized empty drift repository in {}",
                repo.control_dir().display()
            );
        }

        Commands::Add { paths } => {
            repo.stage(&paths).context("add failed")?;
            for p in &paths {
                println!("added: {p}");
            }
        }

        Commands::Unstage { paths } => {
            repo.unstage(&paths).context("unstage failed")?;
        }

        Commands::Commit { message } => {
            // store the message with a trailing newline, as committed history
            // conventionally does
            let id = repo
                .commit(&format!("{message}\n"))
                .context("commit failed")?;
            println!("{id}");
        }

        Commands::Status => {
            print_branch_line(&repo)?;
            let st = repo.status().context("status failed")?;
            print_status(&st);
        }

        Commands::Checkout { target } => {
            repo.checkout(&target).context("checkout failed")?;
            println!("Switched to {target}");
        }

        Commands::Branch { name } => {
            let tip = repo.branch_create(&name).context("branch failed")?;
            println!("Branch '{name}' created at {}", &tip.to_hex()[..7]);
        }

        Commands::Log { limit } => {
            let entries = repo.log(limit).context("log failed")?;
            if entries.is_empty() {
                println!("(no commits)");
            }
            for (id, info) in entries {
                println!("commit {id}");
                if !info.author.is_empty() {
                    println!("Author: {}", info.author);
                }
                let subject = info.message.lines().next().unwrap_or("");
                if !subject.is_empty() {
                    println!("    {subject}");
                }
                println!();
            }
        }

        Commands::Merge { branch } => match repo.merge(&branch).context("merge failed")? {
            MergeOutcome::AlreadyUpToDate => println!("Already up to date."),
            MergeOutcome::FastForward(tip) => {
                println!("Fast-forwarded to {}", &tip.to_hex()[..7]);
            }
            MergeOutcome::Merged(id) => println!("Merged branch '{branch}' as {id}"),
        },

        Commands::Diff { cached } => {
            let out = repo.diff(cached).context("diff failed")?;
            if out.is_empty() {
                println!("(no differences)");
            } else {
                print!("{out}");
            }
        }

        Commands::Clone { src, dest } => {
            Repository::clone_from(&src, &dest).context("clone failed")?;
            println!("Cloned {src} into {}", dest.display());
        }

        Commands::Push { remote, branch } => {
            let branch = match branch {
                Some(b) => b,
                None => current_branch_name(&repo)?,
            };
            repo.push(&remote, &branch).context("push failed")?;
            println!("Pushed {branch} to {remote}");
        }

        Commands::Fetch { remote, name } => {
            let advert = repo.fetch(&remote, &name).context("fetch failed")?;
            match advert.tip {
                Some(tip) => println!("Fetched {name}/{} at {}", advert.branch, &tip.to_hex()[..7]),
                None => println!("Remote has no commits"),
            }
        }

        Commands::Pull { remote, name } => match repo.pull(&remote, &name).context("pull failed")? {
            MergeOutcome::AlreadyUpToDate => println!("Already up to date."),
            MergeOutcome::FastForward(tip) => {
                println!("Fast-forwarded to {}", &tip.to_hex()[..7]);
            }
            MergeOutcome::Merged(_) => println!("Merged remote changes from {name}"),
        },
    }

    Ok(())
}

fn current_branch_name(repo: &Repository) -> Result<String> {
    let refname = repo
        .current_branch_ref()?
        .ok_or(drift_core::Error::SymbolicHeadRequired)?;
    Ok(refname
        .strip_prefix("refs/heads/")
        .unwrap_or(&refname)
        .to_string())
}

fn print_branch_line(repo: &Repository) -> Result<()> {
    use drift_core::HeadState;
    match repo.refs().head()? {
        Some(HeadState::Symbolic(rn)) | Some(HeadState::Unborn(rn)) => {
            let name = rn.strip_prefix("refs/heads/").unwrap_or(&rn);
            println!("On branch {name}\n");
        }
        Some(HeadState::Detached(id)) => {
            println!("HEAD detached at {}\n", &id.to_hex()[..7]);
        }
        None => {}
    }
    Ok(())
}

fn print_status(st: &Status) {
    let code = |kind: ChangeKind| match kind {
        ChangeKind::Added => 'A',
        ChangeKind::Modified => 'M',
        ChangeKind::Deleted => 'D',
    };

    println!("Changes to be committed:");
    for c in &st.staged {
        println!("  {}  {}", code(c.kind), c.path);
    }
    if st.staged.is_empty() {
        println!("  (none)");
    }
    println!();

    println!("Changes not staged for commit:");
    for c in &st.unstaged {
        println!("  {}  {}", code(c.kind), c.path);
    }
    if st.unstaged.is_empty() {
        println!("  (none)");
    }
    println!();

    println!("Untracked files:");
    if st.untracked.is_empty() {
        println!("  (none)");
    } else {
        for p in &st.untracked {
            println!("  {p}");
        }
    }
    println!();
}
