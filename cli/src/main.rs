//! tarja CLI - PDF redaction of Brazilian personal identifiers

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use tarja::{
    is_pdf, redact_dir, BatchEvent, BatchReport, ContextConfig, DocumentOutcome, DocumentReport,
    FillStyle, IdentifierType, PageSelection, RedactOptions, Redactor, TesseractOcr,
};

const DEFAULT_INPUT: &str = "data/input";
const DEFAULT_OUTPUT: &str = "data/output";

#[derive(Parser)]
#[command(name = "tarja")]
#[command(author = "tarja contributors")]
#[command(version)]
#[command(
    about = "Redact CPF, RG, voter title and CNH numbers in PDF files",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    redact: RedactArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Redact every PDF in a directory
    Redact {
        /// Directory with the PDFs to redact
        #[arg(value_name = "INPUT_DIR")]
        input: PathBuf,

        /// Directory the redacted copies are written to
        #[arg(value_name = "OUTPUT_DIR")]
        output: PathBuf,

        #[command(flatten)]
        redact: RedactArgs,
    },

    /// Redact a single PDF
    File {
        /// PDF to redact
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Where the redacted copy is written
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        redact: RedactArgs,
    },

    /// List the identifiers found in a PDF without writing anything
    Scan {
        /// PDF to scan
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        redact: RedactArgs,
    },

    /// Show version information
    Version,
}

#[derive(Args, Clone)]
struct RedactArgs {
    /// Run OCR on every page, ignoring the text layer
    #[arg(long)]
    force_ocr: bool,

    /// Never run OCR, even on pages without text
    #[arg(long, conflicts_with = "force_ocr")]
    no_ocr: bool,

    /// How masked regions are painted
    #[arg(long, value_enum)]
    fill: Option<FillMode>,

    /// Character drawn over hidden digits with --fill overlay
    #[arg(long, default_value = "*")]
    mask_char: char,

    /// Identifier types to look for (e.g. "cpf,rg")
    #[arg(long, value_delimiter = ',')]
    types: Vec<String>,

    /// Page range (e.g., "1-10", "1,3,5")
    #[arg(long)]
    pages: Option<String>,

    /// JSON file with context keyword lists
    #[arg(long, value_name = "FILE", env = "TARJA_CONFIG")]
    config: Option<PathBuf>,

    /// Process documents one at a time
    #[arg(long)]
    sequential: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FillMode {
    /// Opaque black boxes (default)
    Black,
    /// White boxes with the masked digits written over them
    Overlay,
}

impl RedactArgs {
    fn options(&self) -> Result<RedactOptions, Box<dyn std::error::Error>> {
        let fill = match self.fill {
            Some(FillMode::Overlay) => FillStyle::Overlay {
                mask_char: self.mask_char,
            },
            Some(FillMode::Black) | None => FillStyle::Black,
        };

        let mut options = RedactOptions::new()
            .with_fill(fill)
            .with_force_ocr(self.force_ocr)
            .with_ocr_fallback(!self.no_ocr);

        if !self.types.is_empty() {
            let types = self
                .types
                .iter()
                .map(|t| t.parse::<IdentifierType>())
                .collect::<Result<Vec<_>, _>>()?;
            options = options.with_types(types);
        }
        if let Some(pages) = &self.pages {
            let selection =
                PageSelection::parse(pages).map_err(|e| format!("Invalid page range: {}", e))?;
            options = options.with_pages(selection);
        }
        if let Some(path) = &self.config {
            let json = fs::read_to_string(path)?;
            options = options.with_context(ContextConfig::from_json(&json)?);
            log::debug!("Loaded context keywords from {}", path.display());
        }
        if self.sequential {
            options = options.sequential();
        }

        Ok(options)
    }

    fn redactor(&self) -> Result<Redactor, Box<dyn std::error::Error>> {
        Ok(Redactor::new(self.options()?).with_ocr(TesseractOcr::new()))
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Redact {
            input,
            output,
            redact,
        }) => cmd_redact(&input, &output, &redact),
        Some(Commands::File {
            input,
            output,
            redact,
        }) => cmd_file(&input, &output, &redact),
        Some(Commands::Scan { input, redact }) => cmd_scan(&input, &redact),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: the conventional data directories
            cmd_redact(
                Path::new(DEFAULT_INPUT),
                Path::new(DEFAULT_OUTPUT),
                &cli.redact,
            )
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_redact(
    input: &Path,
    output: &Path,
    args: &RedactArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let redactor = args.redactor()?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    let report = thread::scope(|scope| {
        let worker = scope.spawn(|| {
            let result = redact_dir(&redactor, input, output, Some(&tx));
            drop(tx);
            result
        });

        for event in rx.iter() {
            match event {
                BatchEvent::Queued { total } => pb.set_length(total as u64),
                BatchEvent::Started { input } => pb.set_message(file_label(&input)),
                BatchEvent::Finished(outcome) => {
                    if let DocumentOutcome::Failed { input, error } = &outcome {
                        pb.println(format!(
                            "{} {}: {}",
                            "Failed".red(),
                            input.display(),
                            error
                        ));
                    }
                    pb.inc(1);
                }
            }
        }

        worker
            .join()
            .map_err(|_| "batch worker panicked".to_string())
    })??;
    pb.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_batch_summary(&report, output);
    }

    if report.documents.is_empty() {
        println!(
            "{} no PDF files in {}",
            "Warning:".yellow(),
            input.display()
        );
    }
    Ok(())
}

fn cmd_file(
    input: &Path,
    output: &Path,
    args: &RedactArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let report = args.redactor()?.redact_file(input, output)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_document(&report);
        println!("{} {}", "Saved to".green(), output.display());
    }
    Ok(())
}

fn cmd_scan(input: &Path, args: &RedactArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !is_pdf(input) {
        return Err(format!("{} is not a PDF file", input.display()).into());
    }

    let findings = args.redactor()?.scan_file(input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
        return Ok(());
    }

    println!("{}", "Identifiers".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for finding in &findings {
        let status = if finding.located.is_found() {
            "located".green()
        } else {
            "not located".yellow()
        };
        println!(
            "{} {:>3}  {:<18} {:<20} {}",
            "Page".bold(),
            finding.page,
            finding.kind.label(),
            finding.masked,
            status
        );
    }
    println!();
    println!("{}: {}", "Total".bold(), findings.len());
    Ok(())
}

fn print_batch_summary(report: &BatchReport, output: &Path) {
    println!("{}", "Batch Summary".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for outcome in &report.documents {
        match outcome {
            DocumentOutcome::Redacted(doc) => print_document(doc),
            DocumentOutcome::Failed { input, error } => {
                println!("{} {}: {}", "✗".red(), file_label(input), error);
            }
        }
    }
    println!();
    println!("{}: {}", "Redacted".bold(), report.succeeded());
    println!("{}: {}", "Failed".bold(), report.failed());
    println!("{}: {}", "Identifiers".bold(), report.total_matches());
    println!("{}: {}", "Regions".bold(), report.total_regions());
    if report.total_missed() > 0 {
        println!(
            "{}: {}",
            "Not located".bold().yellow(),
            report.total_missed()
        );
    }
    println!("{}: {}", "Output".bold(), output.display());
}

fn print_document(report: &DocumentReport) {
    let missed = match report.total_missed() {
        0 => String::new(),
        n => format!(", {} not located", n).yellow().to_string(),
    };
    let ocr = match report.ocr_pages() {
        0 => String::new(),
        n => format!(", {} OCR pages", n).dimmed().to_string(),
    };
    println!(
        "{} {}: {} identifiers, {} regions{}{} ({} ms)",
        "✓".green(),
        file_label(&report.input),
        report.total_matches(),
        report.total_regions(),
        missed,
        ocr,
        report.duration().num_milliseconds()
    );
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn cmd_version() {
    println!("{} {}", "tarja".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF redaction of CPF, RG, voter title and CNH numbers");
    println!();
    println!("Repository: {}", "https://github.com/tarja-pdf/tarja".dimmed());
    println!("License: MIT");
}
