use std::io::{self, Write};

use engine::content::{check_content, ContentBundle};
use engine::dialogue::{DialoguePreview, DialogueSettings, DialogueView, TraceEvent};
use engine::{registry_document, OptionContext};
use serde::Serialize;
use tracing::info;

use super::bootstrap::{AppError, Boot};

/// Prints the full validation report; fails when it has errors.
pub(crate) fn run_validate(boot: &Boot) -> Result<(), AppError> {
    let checked = check_content(&boot.paths, &boot.config)?;
    let report = &checked.report;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_stdout(&mut out, &report.render_human_readable())?;
    info!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        fingerprint = %checked.bundle.fingerprint,
        "content_validated"
    );
    if report.is_ok() {
        Ok(())
    } else {
        Err(AppError::InvalidContent(report.errors.len()))
    }
}

pub(crate) fn run_registry(boot: &Boot) -> Result<(), AppError> {
    let checked = check_content(&boot.paths, &boot.config)?;
    let document = registry_document(&option_context(&checked.bundle));
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_stdout(&mut out, &serde_json::to_string_pretty(&document)?)
}

#[derive(Debug, Serialize)]
struct PreviewStep {
    choice: Option<usize>,
    view: Option<DialogueView>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct PreviewOutput<'a> {
    entity_id: &'a str,
    steps: Vec<PreviewStep>,
    trace: &'a [TraceEvent],
}

/// Walks an entity's dialogue with the given option indices against a copy
/// of the starting world, then prints every view and the trace as JSON.
pub(crate) fn run_preview(boot: &Boot, entity_id: &str, choices: &[usize]) -> Result<(), AppError> {
    let checked = check_content(&boot.paths, &boot.config)?;
    if !checked.report.is_ok() {
        let stdout = io::stdout();
        write_stdout(&mut stdout.lock(), &checked.report.render_human_readable())?;
        return Err(AppError::InvalidContent(checked.report.errors.len()));
    }
    let bundle = checked.bundle;
    if !bundle.scripts.contains_key(entity_id) {
        return Err(AppError::UnknownEntity(entity_id.to_string()));
    }

    let mut preview = DialoguePreview::new(
        bundle.scripts,
        DialogueSettings::from(&boot.config),
        bundle.world.player,
        bundle.world.quests,
        bundle.maps,
    );
    let steps = walk_preview(&mut preview, entity_id, choices);

    let output = PreviewOutput {
        entity_id,
        steps,
        trace: preview.trace(),
    };
    let stdout = io::stdout();
    write_stdout(&mut stdout.lock(), &serde_json::to_string_pretty(&output)?)
}

fn walk_preview(preview: &mut DialoguePreview, entity_id: &str, choices: &[usize]) -> Vec<PreviewStep> {
    let mut steps = vec![PreviewStep {
        choice: None,
        view: preview.open(entity_id, None),
        error: None,
    }];
    for &choice in choices {
        if !preview.is_open() {
            break;
        }
        let step = match preview.choose(choice) {
            Ok(report) => PreviewStep {
                choice: Some(choice),
                view: report.view,
                error: None,
            },
            Err(err) => PreviewStep {
                choice: Some(choice),
                view: preview.view(),
                error: Some(err.to_string()),
            },
        };
        steps.push(step);
    }
    steps
}

fn option_context(bundle: &ContentBundle) -> OptionContext {
    OptionContext {
        quest_ids: bundle.world.quests.ids().map(ToString::to_string).collect(),
        skill_ids: bundle.world.player.skills.keys().cloned().collect(),
        map_ids: bundle.maps.keys().cloned().collect(),
    }
}

fn write_stdout<W: Write>(out: &mut W, text: &str) -> Result<(), AppError> {
    writeln!(out, "{text}").map_err(|source| AppError::Io {
        stream: "stdout",
        source,
    })
}
