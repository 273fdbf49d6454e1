//! `cvpubs` command line.

use clap::{Parser, Subcommand, ValueEnum};
use cvpubs::config::{DEFAULT_SETTINGS_FILE, Settings};
use cvpubs::registry::{
    HttpRegistryClient, RegistryEnvironment, TokenStore, sync_to_registry,
};
use cvpubs::workflow::{self, ImportOptions};
use cvpubs::{
    CsvCitationExtractor, Error, Matcher, Merger, OrcidId, PublicationCollection,
    RecordExtractor, RegistryExtractor, Result, ScholarHtmlExtractor,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Keep the publication list of an academic CV in sync with its sources.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Publication collection (overrides the settings file)
    #[arg(long, global = true)]
    publications: Option<PathBuf>,

    /// Replace the collection instead of merging into it
    #[arg(long, global = true)]
    no_merge: bool,

    /// Do not back up the collection before writing it
    #[arg(long, global = true)]
    no_backup: bool,

    /// Show what would change without writing anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Minimum title similarity for a fuzzy match (0.0 - 1.0)
    #[arg(long, global = true)]
    similarity_threshold: Option<f64>,

    /// Use the ORCID sandbox
    #[arg(long, global = true)]
    sandbox: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import publications from a BibTeX file
    ImportBibtex {
        /// BibTeX file (defaults to the bibliography of the settings file)
        file: Option<PathBuf>,
    },
    /// Import the works of an ORCID profile
    ImportOrcid {
        /// ORCID iD or profile URL
        orcid: String,
    },
    /// Update citation counts from a Google Scholar page or a CSV export
    ImportCitations {
        /// Saved Scholar profile page or CSV export
        file: PathBuf,

        /// Input format (guessed from the extension when omitted)
        #[arg(long, value_enum)]
        format: Option<CitationFormat>,

        /// BibTeX file to match against (overrides the settings file)
        #[arg(long)]
        bibliography: Option<PathBuf>,
    },
    /// Write the collection as BibTeX
    ExportBibtex {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Post publications missing from an ORCID profile
    OrcidSync {
        /// ORCID iD or profile URL
        orcid: String,
    },
    /// List stored ORCID access tokens
    OrcidStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CitationFormat {
    Html,
    Csv,
}

impl CitationFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => CitationFormat::Csv,
            _ => CitationFormat::Html,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(&cli.config)?;
    if let Some(threshold) = cli.similarity_threshold {
        settings.matching.similarity_threshold = threshold;
        settings.validate()?;
    }
    if cli.sandbox {
        settings.registry.environment = RegistryEnvironment::Sandbox;
    }
    let publications = cli
        .publications
        .clone()
        .unwrap_or_else(|| settings.paths.publications.clone());
    let options = import_options(&cli);
    let merger = Merger::new().with_policy(settings.duplicates);
    debug!(?settings, ?options, "resolved settings");

    match cli.command {
        Command::ImportBibtex { file } => {
            let file = file.unwrap_or_else(|| settings.paths.bibliography.clone());
            let bibtex = fs::read_to_string(&file)?;
            let report = workflow::import_bibliography(&bibtex, &publications, &options, &merger)?;
            print!("{report}");
        }
        Command::ImportOrcid { orcid } => {
            let client = HttpRegistryClient::new(settings.registry.environment)?;
            let extractor = RegistryExtractor::new(client);
            let report =
                workflow::import_registry(&extractor, &orcid, &publications, &options, &merger)?;
            print!("{report}");
        }
        Command::ImportCitations {
            file,
            format,
            bibliography,
        } => {
            let format = format.unwrap_or_else(|| CitationFormat::from_path(&file));
            let input = fs::read_to_string(&file)?;
            let citations = match format {
                CitationFormat::Html => ScholarHtmlExtractor::new().extract(&input)?,
                CitationFormat::Csv => CsvCitationExtractor::new().extract(&input)?,
            };
            let bibliography = bibliography.unwrap_or_else(|| settings.paths.bibliography.clone());
            let bibtex = fs::read_to_string(&bibliography)?;
            let matcher = Matcher::new().with_config(settings.matcher_config());
            let report =
                workflow::update_citations(citations, &bibtex, &publications, &matcher, &options)?;
            print!("{report}");
        }
        Command::ExportBibtex { output } => {
            let collection = PublicationCollection::load(&publications)?;
            let bibtex = cvpubs::bibtex::export_bibtex(&collection);
            match output {
                Some(path) => {
                    fs::write(&path, bibtex)?;
                    info!(path = %path.display(), records = collection.len(), "exported BibTeX");
                }
                None => print!("{bibtex}"),
            }
        }
        Command::OrcidSync { orcid } => {
            let id = OrcidId::parse(&orcid)?;
            let tokens = TokenStore::load(token_file(&settings)?)?;
            let collection = PublicationCollection::load(&publications)?;
            let client = HttpRegistryClient::new(settings.registry.environment)?;
            let report =
                sync_to_registry(&client, &client, &tokens, &id, &collection, cli.dry_run)?;
            print!("{report}");
        }
        Command::OrcidStatus => {
            let tokens = TokenStore::load(token_file(&settings)?)?;
            if let Some(path) = tokens.path() {
                println!("Token file: {}", path.display());
            }
            if tokens.is_empty() {
                println!("No ORCID tokens stored");
            }
            for (id, token) in tokens.entries() {
                let scope = token.scope.as_deref().unwrap_or("unknown scope");
                match &token.name {
                    Some(name) => println!("  {id} ({name}): {} [{scope}]", token.masked()),
                    None => println!("  {id}: {} [{scope}]", token.masked()),
                }
            }
        }
    }
    Ok(())
}

fn import_options(cli: &Cli) -> ImportOptions {
    ImportOptions {
        merge: !cli.no_merge,
        backup: !cli.no_backup,
        dry_run: cli.dry_run,
    }
}

fn token_file(settings: &Settings) -> Result<PathBuf> {
    if let Some(path) = &settings.registry.token_file {
        return Ok(path.clone());
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".cv-manager").join("orcid_tokens.yaml"))
        .ok_or_else(|| Error::InvalidSetting {
            field: "registry.token_file".to_string(),
            message: "no home directory to store tokens in".to_string(),
        })
}
