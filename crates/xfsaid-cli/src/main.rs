use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xfsaid_core::{
	BlockMapSummary, CommandRunner, DirectoryEntry, DirectoryScanner, FileHandle, MetadataOracle,
	OracleConfig, RescueConfig, RescueEvent, RescueOrchestrator, RescueStatus, XFS_DB_ENV,
};

#[derive(Parser, Debug)]
#[command(name = "xfs-aid", version, about = "Rescue files from a damaged XFS filesystem")]
struct Cli {
	/// xfs_db binary used to read metadata
	#[arg(long, global = true, env = XFS_DB_ENV, value_name = "PATH")]
	xfs_db: Option<PathBuf>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Inspect a single file by inode number
	File {
		#[command(subcommand)]
		action: FileAction,
	},
	/// Walk the directory tree
	Scan {
		#[command(subcommand)]
		view: ScanView,
	},
	/// Copy every healthy file under a target directory
	Rescue {
		/// Device or image holding the damaged filesystem
		device: PathBuf,
		/// Absent or empty directory receiving the files
		target: PathBuf,
		/// Write a JSON report of the rescue to this file
		#[arg(long, value_name = "FILE")]
		report: Option<PathBuf>,
		/// Skip SHA-256 hashing of rescued files
		#[arg(long)]
		no_digest: bool,
	},
}

#[derive(Subcommand, Debug)]
enum FileAction {
	/// Print the block map and a summary line
	Bmap { device: PathBuf, ino: u64 },
	/// Stream the file's bytes to stdout
	Raw { device: PathBuf, ino: u64 },
}

#[derive(Subcommand, Debug)]
enum ScanView {
	/// Every directory and file
	All { device: PathBuf },
	/// Objects whose metadata is damaged
	Damaged { device: PathBuf },
	/// Regular files that can be rescued
	Files { device: PathBuf },
}

fn default_env_filter() -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn main() -> Result<()> {
	// Diagnostics go to stderr; stdout carries file bytes for `file raw`
	tracing_subscriber::fmt()
		.with_env_filter(default_env_filter())
		.with_writer(io::stderr)
		.init();

	let cli = Cli::parse();
	let config = match cli.xfs_db {
		Some(program) => OracleConfig::default().with_program(program),
		None => OracleConfig::from_env(),
	};

	match cli.command {
		Commands::File { action } => match action {
			FileAction::Bmap { device, ino } => file_bmap(device, ino, config),
			FileAction::Raw { device, ino } => file_raw(device, ino, config),
		},
		Commands::Scan { view } => scan(view, config),
		Commands::Rescue {
			device,
			target,
			report,
			no_digest,
		} => rescue(device, target, report, no_digest, config),
	}
}

fn open(device: &Path, config: OracleConfig) -> Result<MetadataOracle> {
	MetadataOracle::open(device, config)
		.with_context(|| format!("Cannot open {}", device.display()))
}

fn file_bmap(device: PathBuf, ino: u64, config: OracleConfig) -> Result<()> {
	let oracle = open(&device, config)?;
	let file = FileHandle::open(&oracle, ino)?;
	let extents = file.extents()?;

	let mut stdout = io::stdout().lock();
	for extent in &extents {
		writeln!(stdout, "{extent}")?;
	}
	writeln!(stdout, "{}", BlockMapSummary::new(file.size(), &extents))?;
	Ok(())
}

fn file_raw(device: PathBuf, ino: u64, config: OracleConfig) -> Result<()> {
	let oracle = open(&device, config)?;
	let file = FileHandle::open(&oracle, ino)?;
	let mut stdout = io::stdout().lock();
	file.raw(&mut stdout)
		.with_context(|| format!("Failed to copy inode {ino}"))?;
	Ok(())
}

fn scan(view: ScanView, config: OracleConfig) -> Result<()> {
	let device = match &view {
		ScanView::All { device } | ScanView::Damaged { device } | ScanView::Files { device } => {
			device.clone()
		}
	};
	let oracle = open(&device, config)?;
	let scanner = DirectoryScanner::new(&oracle);

	match view {
		ScanView::All { .. } => show_entries(&scanner, scanner.objects())?,
		ScanView::Damaged { .. } => show_entries(&scanner, scanner.damaged())?,
		ScanView::Files { .. } => show_entries(&scanner, scanner.files())?,
	}

	if let Some(e) = scanner.take_root_failure() {
		return Err(e).context("Cannot list the root directory");
	}
	Ok(())
}

fn show_entries<R, I>(scanner: &DirectoryScanner<'_, R>, entries: I) -> Result<()>
where
	R: CommandRunner,
	I: Iterator<Item = DirectoryEntry>,
{
	let mut stdout = io::stdout().lock();
	for entry in entries {
		writeln!(stdout, "{}", scanner.show(&entry))?;
	}
	Ok(())
}

fn rescue(
	device: PathBuf,
	target: PathBuf,
	report_path: Option<PathBuf>,
	no_digest: bool,
	config: OracleConfig,
) -> Result<()> {
	let oracle = open(&device, config)?;
	let rescue_config = RescueConfig {
		compute_digest: !no_digest,
	};
	let orchestrator = RescueOrchestrator::new(&oracle, &target, rescue_config)?;

	let mut stdout = io::stdout().lock();
	let mut stdout_error = None;
	let report = orchestrator.run(|event| match event {
		RescueEvent::Rebuilding { ino, size, target } => {
			if let Err(e) = writeln!(stdout, "rebuild inode {ino} size {size} => {}", target.display()) {
				stdout_error.get_or_insert(e);
			}
		}
		RescueEvent::Finished(outcome) => {
			if let RescueStatus::Failed(reason) = &outcome.status {
				eprintln!(
					"rebuild inode {} => {} failed: {}",
					outcome.ino,
					outcome.target.display(),
					reason
				);
			}
		}
	})?;
	if let Some(e) = stdout_error {
		return Err(e).context("Failed to write progress");
	}

	if let Some(path) = report_path {
		let json = report.to_json_pretty()?;
		std::fs::write(&path, json)
			.with_context(|| format!("Failed to write report {}", path.display()))?;
	}

	tracing::info!(
		"Session {}: {} rescued, {} failed, {} damaged skipped",
		report.session_id,
		report.rescued_files,
		report.failed_files,
		report.damaged_objects
	);
	Ok(())
}
