mod display;
mod validate;

use std::path::{Path, PathBuf};

use alvara_core::{
    AttachmentKind, NewAttachment, NewLegislation, NewProcess, NewRule, ProcessField, ProcessStatus,
};
use alvara_report::inspect_pdf;
use alvara_store::{DuckStore, LegislationStore, ProcessStore};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::validate::{ValidateOptions, run_validate};

#[derive(Parser)]
#[command(name = "alvara", version, about = "Municipal building permit processing")]
struct Cli {
    /// DuckDB database file.
    #[arg(long, global = true, env = "ALVARA_DB", default_value = "alvara.duckdb")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema and print table counts.
    Init,
    /// Manage legislations.
    #[command(subcommand)]
    Legislation(LegislationCommand),
    /// Manage the numeric rules of a legislation.
    #[command(subcommand)]
    Rule(RuleCommand),
    /// Manage permit processes.
    #[command(subcommand)]
    Process(ProcessCommand),
    /// Work with stored PDF attachments.
    #[command(subcommand)]
    Attachment(AttachmentCommand),
    /// Evaluate a process against its applicable rules.
    Validate {
        /// Process number.
        number: String,
        /// Only evaluate rules of this legislation (repeatable, kept in order).
        #[arg(long = "legislation", value_name = "NAME")]
        legislations: Vec<String>,
        /// Do not record the resulting status.
        #[arg(long)]
        dry_run: bool,
        /// Print the verdicts as JSON.
        #[arg(long)]
        json: bool,
        /// Also write a PDF report to this file.
        #[arg(long, value_name = "FILE")]
        pdf: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum LegislationCommand {
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Restrict to one land-use category; applies to all when omitted.
        #[arg(long)]
        land_use: Option<String>,
    },
    List,
    Show {
        name: String,
    },
    /// Delete a legislation together with its rules and PDFs.
    Delete {
        name: String,
    },
    /// Attach a PDF of the legislation text.
    Attach {
        name: String,
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum RuleCommand {
    Add {
        legislation: String,
        #[arg(long)]
        article: String,
        /// One of: area_total, area_terreno, altura, pavimentos, vagas, recuo_frontal.
        #[arg(long)]
        field: String,
        /// Name or symbol: equals (==), not-equals (!=), greater-than (>),
        /// greater-or-equal (>=), less-than (<), less-or-equal (<=).
        #[arg(long, allow_hyphen_values = true)]
        operator: String,
        #[arg(long, allow_hyphen_values = true)]
        reference: f64,
        #[arg(long, default_value = "")]
        description: String,
        /// Failure message template; may use {field}, {value}, {operator},
        /// {reference} and {article}.
        #[arg(long, default_value = "")]
        message: String,
    },
    List {
        legislation: String,
    },
    Delete {
        id: i64,
    },
}

#[derive(Args)]
struct ProcessArgs {
    number: String,
    #[arg(long)]
    requester: String,
    #[arg(long)]
    technician: String,
    #[arg(long)]
    land_use: String,
    #[arg(long)]
    total_area: f64,
    #[arg(long)]
    lot_area: Option<f64>,
    #[arg(long)]
    height: Option<f64>,
    #[arg(long)]
    floors: Option<f64>,
    #[arg(long)]
    parking_spaces: Option<f64>,
    #[arg(long)]
    front_setback: Option<f64>,
    #[arg(long)]
    analyst: Option<String>,
    /// Protocol date, RFC 3339 or YYYY-MM-DD; defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    protocol_at: Option<DateTime<Utc>>,
}

impl ProcessArgs {
    fn into_submission(self) -> NewProcess {
        let mut submission = NewProcess::new(
            self.number,
            self.requester,
            self.technician,
            self.land_use,
            self.total_area,
        );
        for (field, value) in [
            (ProcessField::LotArea, self.lot_area),
            (ProcessField::Height, self.height),
            (ProcessField::Floors, self.floors),
            (ProcessField::ParkingSpaces, self.parking_spaces),
            (ProcessField::FrontSetback, self.front_setback),
        ] {
            if let Some(value) = value {
                submission = submission.with_attribute(field, value);
            }
        }
        if let Some(analyst) = self.analyst {
            submission = submission.with_analyst(analyst);
        }
        if let Some(at) = self.protocol_at {
            submission = submission.with_protocol_at(at);
        }
        submission
    }
}

#[derive(Subcommand)]
enum ProcessCommand {
    Add(ProcessArgs),
    List,
    Show {
        number: String,
    },
    /// Set the status by hand ("Em análise", "Aprovado", "Reprovado").
    Status {
        number: String,
        status: String,
    },
    Assign {
        number: String,
        analyst: String,
    },
    /// Attach a project PDF (floor plan, descriptive memorial, ...).
    Attach {
        number: String,
        file: PathBuf,
        #[arg(long)]
        doc_type: String,
    },
}

#[derive(Subcommand)]
enum AttachmentCommand {
    /// Write a stored PDF to disk.
    Get {
        /// "legislation" or "project".
        kind: String,
        id: i64,
        #[arg(long)]
        out: PathBuf,
    },
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid date '{s}', expected RFC 3339 or YYYY-MM-DD"))
}

/// Read a PDF from disk, rejecting anything lopdf cannot parse.
fn read_pdf(path: &Path) -> anyhow::Result<NewAttachment> {
    let content = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let pdf = inspect_pdf(&content).with_context(|| format!("{} is not a usable PDF", path.display()))?;
    info!(path = %path.display(), pages = pdf.page_count, version = %pdf.version, "inspected upload");
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "documento.pdf".to_string());
    Ok(NewAttachment::new(filename, content))
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("alvara v{}", env!("CARGO_PKG_VERSION"));

    let mut store = DuckStore::open_persistent(&cli.db)
        .with_context(|| format!("opening {}", cli.db.display()))?;

    match cli.command {
        Command::Init => {
            for (table, count) in store.table_counts()? {
                println!("  {table:<20} {count:>8}");
            }
        }
        Command::Legislation(cmd) => legislation(&mut store, cmd)?,
        Command::Rule(cmd) => rule(&mut store, cmd)?,
        Command::Process(cmd) => process(&mut store, cmd)?,
        Command::Attachment(AttachmentCommand::Get { kind, id, out }) => {
            let kind: AttachmentKind = kind.parse()?;
            let attachment = match kind {
                AttachmentKind::Legislation => store.legislation_pdf(id)?,
                AttachmentKind::Project => store.project_pdf(id)?,
            };
            std::fs::write(&out, &attachment.content)
                .with_context(|| format!("writing {}", out.display()))?;
            println!(
                "{} ({} bytes) -> {}",
                attachment.filename,
                attachment.content.len(),
                out.display()
            );
        }
        Command::Validate {
            number,
            legislations,
            dry_run,
            json,
            pdf,
        } => {
            let opts = ValidateOptions {
                legislations,
                dry_run,
                json,
                pdf,
            };
            let outcome = run_validate(&mut store, &number, &opts)?;
            println!("{}", outcome.output.trim_end());
            if !outcome.recorded && !opts.json {
                println!("(simulação: status não registrado)");
            }
        }
    }
    Ok(())
}

fn legislation(store: &mut DuckStore, cmd: LegislationCommand) -> anyhow::Result<()> {
    match cmd {
        LegislationCommand::Add {
            name,
            description,
            land_use,
        } => {
            let mut new = NewLegislation::new(name, description);
            if let Some(land_use) = land_use {
                new = new.for_land_use(land_use);
            }
            let created = store.create_legislation(new)?;
            println!("Legislação '{}' cadastrada (id {}).", created.name, created.id);
        }
        LegislationCommand::List => display::print_legislations(&store.legislations()?),
        LegislationCommand::Show { name } => {
            let legislation = store.legislation(&name)?;
            let rules = store.rules(&name)?;
            let pdfs = store.legislation_pdfs(&name)?;
            display::print_legislation(&legislation, &rules, &pdfs);
        }
        LegislationCommand::Delete { name } => {
            let summary = store.delete_legislation(&name)?;
            println!(
                "Legislação '{name}' removida com {} regra(s) e {} anexo(s).",
                summary.rules, summary.pdfs
            );
        }
        LegislationCommand::Attach { name, file } => {
            let meta = store.attach_legislation_pdf(&name, read_pdf(&file)?)?;
            println!("Anexo {} ({} bytes) vinculado a '{name}'.", meta.id, meta.size);
        }
    }
    Ok(())
}

fn rule(store: &mut DuckStore, cmd: RuleCommand) -> anyhow::Result<()> {
    match cmd {
        RuleCommand::Add {
            legislation,
            article,
            field,
            operator,
            reference,
            description,
            message,
        } => {
            let new = NewRule::parse(&article, &description, &field, &operator, reference, &message)?;
            let created = store.add_rule(&legislation, new)?;
            println!(
                "Regra {} adicionada: {} {} {} {}",
                created.id, created.article, created.field, created.operator, created.reference
            );
        }
        RuleCommand::List { legislation } => display::print_rules(&store.rules(&legislation)?),
        RuleCommand::Delete { id } => {
            store.delete_rule(id)?;
            println!("Regra {id} removida.");
        }
    }
    Ok(())
}

fn process(store: &mut DuckStore, cmd: ProcessCommand) -> anyhow::Result<()> {
    match cmd {
        ProcessCommand::Add(args) => {
            let created = store.create_process(args.into_submission())?;
            println!("Processo {} cadastrado ({}).", created.number, created.status);
        }
        ProcessCommand::List => {
            let batches = store.query_arrow(
                "SELECT numero, requerente, uso, area_total, status, data_protocolo \
                 FROM processos ORDER BY id",
            )?;
            println!("{}", arrow::util::pretty::pretty_format_batches(&batches)?);
        }
        ProcessCommand::Show { number } => {
            let batch = store.process_batch(&number)?;
            display::print_process_card(&batch)?;
            let pdfs = store.project_pdfs(&number)?;
            if !pdfs.is_empty() {
                println!("Anexos");
                display::print_attachments(&pdfs);
            }
        }
        ProcessCommand::Status { number, status } => {
            let status: ProcessStatus = status.parse()?;
            let updated = store.set_status(&number, status)?;
            println!("Processo {}: {}", updated.number, updated.status);
        }
        ProcessCommand::Assign { number, analyst } => {
            let updated = store.assign_analyst(&number, &analyst)?;
            println!(
                "Processo {} atribuído a {}.",
                updated.number,
                updated.analyst.as_deref().unwrap_or_default()
            );
        }
        ProcessCommand::Attach {
            number,
            file,
            doc_type,
        } => {
            let meta = store.attach_project_pdf(&number, &doc_type, read_pdf(&file)?)?;
            println!("Anexo {} ({}) vinculado ao processo {number}.", meta.id, doc_type);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn validate_accepts_repeated_legislations() {
        let cli = Cli::try_parse_from([
            "alvara",
            "--db",
            "x.duckdb",
            "validate",
            "2024/0001",
            "--legislation",
            "Plano Diretor",
            "--legislation",
            "Código de Obras",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.db, PathBuf::from("x.duckdb"));
        match cli.command {
            Command::Validate {
                legislations,
                dry_run,
                json,
                ..
            } => {
                assert_eq!(legislations, vec!["Plano Diretor", "Código de Obras"]);
                assert!(dry_run);
                assert!(!json);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn rule_add_takes_symbolic_operator() {
        let cli = Cli::try_parse_from([
            "alvara", "rule", "add", "Código de Obras", "--article", "Art. 5", "--field",
            "area_total", "--operator", ">=", "--reference", "100",
        ])
        .unwrap();
        let Command::Rule(RuleCommand::Add { operator, reference, .. }) = cli.command else {
            panic!("expected rule add");
        };
        assert_eq!(operator, ">=");
        assert_eq!(reference, 100.0);
    }

    #[test]
    fn process_args_build_submission() {
        let cli = Cli::try_parse_from([
            "alvara", "process", "add", "2024/0007", "--requester", "Ana", "--technician",
            "Eng. Bruno", "--land-use", "residencial", "--total-area", "120.5", "--floors", "2",
            "--protocol-at", "2024-03-01",
        ])
        .unwrap();
        let Command::Process(ProcessCommand::Add(args)) = cli.command else {
            panic!("expected process add");
        };
        let submission = args.into_submission();
        assert_eq!(submission.total_area, 120.5);
        assert_eq!(submission.floors, Some(2.0));
        assert_eq!(submission.height, None);
        assert_eq!(
            submission.protocol_at,
            Some("2024-03-01T00:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn parse_timestamp_accepts_rfc3339_and_dates() {
        assert!(parse_timestamp("2024-03-01T12:30:00-03:00").is_ok());
        assert!(parse_timestamp("2024-03-01").is_ok());
        assert!(parse_timestamp("01/03/2024").is_err());
    }
}
