use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use regcheck_core::corpus::{CorpusLoader, JsonCorpus};
use regcheck_core::models::{ComplianceVerdict, MaintenanceAction, RegulationSource};
use regcheck_core::report::{StructuredReport, render_consolidated, render_structured};
use regcheck_core::{Regcheck, RegcheckError};
use serde::{Deserialize, Serialize};

use crate::cli::{CheckArgs, Commands, IngestArgs, OutputFormat, RulesArgs};


pub(crate) fn run_from_root(root: &Path, command: Commands) -> Result<()> {
    let app = Regcheck::new(root).context("failed to open regcheck workspace")?;
    match command {
        Commands::Init => {
            println!("initialized at {}", root.display());
        }
        Commands::Ingest(args) => handle_ingest(&app, &args)?,
        Commands::Status => print_json(&app.status()?)?,
        Commands::Check(args) => handle_check(&app, &args)?,
        Commands::Rules(args) => handle_rules(&app, &args)?,
    }
    Ok(())
}

/// Writes the error payload for a failed command to stderr.
pub(crate) fn report_error(operation: &str, err: &anyhow::Error) {
    let mut payload = err.downcast_ref::<RegcheckError>().map_or_else(
        || RegcheckError::Internal(String::new()).to_payload(operation),
        |core| core.to_payload(operation),
    );
    payload.message = format!("{err:#}");
    tracing::error!(operation, code = %payload.code, trace_id = %payload.trace_id, "command failed");
    let rendered = serde_json::to_string_pretty(&payload)
        .unwrap_or_else(|_| format!("{{\"message\": {:?}}}", payload.message));
    eprintln!("{rendered}");
}

fn handle_ingest(app: &Regcheck, args: &IngestArgs) -> Result<()> {
    let corpora = args.corpora();
    if corpora.is_empty() {
        bail!("ingest requires at least one of --primary, --official, --supplementary");
    }
    let loaders = corpora
        .into_iter()
        .map(|(source, path)| Box::new(JsonCorpus::new(path, source)) as Box<dyn CorpusLoader>)
        .collect::<Vec<_>>();

    let report = app.bootstrap(&loaders);
    print_json(&report)?;
    if report.total_failure {
        bail!("no regulation corpus could be loaded");
    }
    Ok(())
}

/// Action as accepted on the command line; a missing timestamp means now.
#[derive(Debug, Deserialize)]
struct ActionInput {
    id: String,
    #[serde(default)]
    description: String,
    component: String,
    proposed_action: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl From<ActionInput> for MaintenanceAction {
    fn from(input: ActionInput) -> Self {
        Self {
            id: input.id,
            description: input.description,
            component: input.component,
            proposed_action: input.proposed_action,
            timestamp: input.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CheckInput {
    Batch(Vec<ActionInput>),
    Single(ActionInput),
}

fn parse_check_input(raw: &str) -> Result<(Vec<MaintenanceAction>, bool)> {
    let input: CheckInput =
        serde_json::from_str(raw).context("input must be an action object or an array of actions")?;
    Ok(match input {
        CheckInput::Batch(actions) => (actions.into_iter().map(Into::into).collect(), true),
        CheckInput::Single(action) => (vec![action.into()], false),
    })
}

#[derive(Debug, Serialize)]
struct SingleCheckOutput {
    #[serde(flatten)]
    verdict: ComplianceVerdict,
    report: StructuredReport,
}

fn handle_check(app: &Regcheck, args: &CheckArgs) -> Result<()> {
    let raw = read_input(&args.input)?;
    let (actions, is_batch) = parse_check_input(&raw)?;

    if is_batch {
        let results = app.check_compliance_batch(&actions);
        match args.format {
            OutputFormat::Json => print_json(&results)?,
            OutputFormat::Text => match results.first() {
                Some(first) => print_text(&first.consolidated_report)?,
                None => print_text(&render_consolidated(&[], &[]))?,
            },
        }
        return Ok(());
    }

    let [action] = actions.as_slice() else {
        bail!("expected exactly one action");
    };
    let verdict = app.check_compliance(action);
    match args.format {
        OutputFormat::Json => print_json(&SingleCheckOutput {
            report: render_structured(action, &verdict),
            verdict,
        })?,
        OutputFormat::Text => print_text(&render_consolidated(
            std::slice::from_ref(action),
            std::slice::from_ref(&verdict),
        ))?,
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct RuleView {
    id: String,
    source: RegulationSource,
    category: String,
    text: String,
}

fn handle_rules(app: &Regcheck, args: &RulesArgs) -> Result<()> {
    let rules = app
        .rules(args.source)?
        .into_iter()
        .take(args.limit.unwrap_or(usize::MAX))
        .map(|rule| RuleView {
            id: rule.id,
            source: rule.source,
            category: rule.category,
            text: rule.text,
        })
        .collect::<Vec<_>>();
    print_json(&rules)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read actions from stdin")?;
        return Ok(raw);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn print_text(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}")?;
    Ok(())
}
