use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::ViewArgs;
use crate::model::{ResponseOption, VariableRecord};
use crate::util::{format_count, sha256_file};

const WRAP_WIDTH: usize = 72;
const HEADING_WIDTH: usize = 15;
const EMPTY_FIELD: &str = "---";
const ROUNDING_NOTE: &str = "Note: Totals are extracted from the codebook, and may not add up due to rounding \
(off by up to 1 for weighted frequency and up to 0.2% for percent).";

pub fn run(args: ViewArgs) -> Result<()> {
    let records = load_records(&args.data)?;

    info!(
        path = %args.data.display(),
        sha256 = %sha256_file(&args.data)?,
        records = records.len(),
        "loaded record collection"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.list {
        return render_list(&mut out, &records);
    }

    let index = select_index(&records, args.variable.as_deref(), args.index)?;
    if args.json {
        return render_json(&mut out, &records[index]);
    }

    render_record(&mut out, &records, index)
}

fn load_records(path: &Path) -> Result<Vec<VariableRecord>> {
    if !path.exists() {
        bail!(
            "viewer load error: record file {} not found; run `cdbk extract` first",
            path.display()
        );
    }

    let raw = fs::read(path)
        .with_context(|| format!("viewer load error: failed to read {}", path.display()))?;
    let records: Vec<VariableRecord> = serde_json::from_slice(&raw).with_context(|| {
        format!(
            "viewer load error: {} is not a valid record collection",
            path.display()
        )
    })?;

    Ok(records)
}

fn select_index(
    records: &[VariableRecord],
    variable: Option<&str>,
    index: Option<usize>,
) -> Result<usize> {
    if records.is_empty() {
        bail!("record collection is empty; nothing to display");
    }

    if let Some(variable) = variable {
        return records
            .iter()
            .position(|record| record.variable_name.eq_ignore_ascii_case(variable))
            .with_context(|| format!("variable {variable} not found in record collection"));
    }

    let index = index.unwrap_or(0);
    if index >= records.len() {
        bail!(
            "index {index} is out of range; collection has {} records",
            records.len()
        );
    }
    Ok(index)
}

fn summary(record: &VariableRecord) -> &str {
    record
        .concept
        .as_deref()
        .filter(|concept| !concept.is_empty())
        .unwrap_or(record.label.as_str())
}

fn render_list<W: Write>(out: &mut W, records: &[VariableRecord]) -> Result<()> {
    for (index, record) in records.iter().enumerate() {
        writeln!(
            out,
            "{index:>5}  {} - {}",
            record.variable_name,
            summary(record)
        )?;
    }
    Ok(())
}

fn render_json<W: Write>(out: &mut W, record: &VariableRecord) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, record).context("failed to render record as json")?;
    writeln!(out)?;
    Ok(())
}

fn render_record<W: Write>(out: &mut W, records: &[VariableRecord], index: usize) -> Result<()> {
    let record = &records[index];

    writeln!(
        out,
        "Variable Name: {}    Length: {}    Position: {}    Page: {}",
        record.variable_name,
        record.length.as_deref().unwrap_or(EMPTY_FIELD),
        record.position.as_deref().unwrap_or(EMPTY_FIELD),
        record.page
    )?;
    writeln!(out, "Record {} of {}", index + 1, records.len())?;
    writeln!(out)?;

    let label = Some(record.label.clone()).filter(|label| !label.is_empty());
    let fields = [
        ("Question Name", &record.question_name),
        ("Concept", &record.concept),
        ("Question Text", &label),
        ("Universe", &record.universe),
        ("Note", &record.note),
        ("Source", &record.source),
    ];
    for (heading, value) in fields {
        render_field(out, heading, value.as_deref())?;
    }

    if !record.options.is_empty() {
        writeln!(out)?;
        render_options(out, record)?;
    }

    writeln!(out)?;
    let previous = index
        .checked_sub(1)
        .map(|previous| format!("< {}", records[previous].variable_name));
    let next = records
        .get(index + 1)
        .map(|next| format!("{} >", next.variable_name));
    match (previous, next) {
        (Some(previous), Some(next)) => writeln!(out, "{previous}    {next}")?,
        (Some(previous), None) => writeln!(out, "{previous}")?,
        (None, Some(next)) => writeln!(out, "{next}")?,
        (None, None) => {}
    }

    Ok(())
}

fn render_field<W: Write>(out: &mut W, heading: &str, value: Option<&str>) -> Result<()> {
    let value = value.filter(|value| !value.is_empty()).unwrap_or(EMPTY_FIELD);
    let wrapped = wrap_text(value, WRAP_WIDTH - HEADING_WIDTH);
    for (line_index, line) in wrapped.iter().enumerate() {
        let heading = if line_index == 0 { heading } else { "" };
        writeln!(out, "{heading:<width$}{line}", width = HEADING_WIDTH)?;
    }
    Ok(())
}

fn render_options<W: Write>(out: &mut W, record: &VariableRecord) -> Result<()> {
    let label_width = record
        .options
        .iter()
        .map(|option| option.label.chars().count())
        .max()
        .unwrap_or(0)
        .max("Answer Categories".len());
    let has_counts = record.options.iter().any(has_count_columns);

    if has_counts {
        writeln!(
            out,
            "{:<label_width$}  {:>6}  {:>10}  {:>18}  {:>6}",
            "Answer Categories", "Code", "Frequency", "Weighted Frequency", "%"
        )?;
    } else {
        writeln!(out, "{:<label_width$}  {:>6}", "Answer Categories", "Code")?;
    }

    for option in &record.options {
        if has_counts {
            writeln!(
                out,
                "{:<label_width$}  {:>6}  {:>10}  {:>18}  {:>6}",
                option.label,
                option.code.to_string(),
                option.frequency.map(format_count).unwrap_or_default(),
                option.weighted_frequency.map(format_count).unwrap_or_default(),
                option
                    .percent
                    .map(|percent| format!("{percent:.1}"))
                    .unwrap_or_default()
            )?;
        } else {
            writeln!(
                out,
                "{:<label_width$}  {:>6}",
                option.label,
                option.code.to_string()
            )?;
        }
    }

    if let Some(totals) = &record.totals {
        writeln!(
            out,
            "{:<label_width$}  {:>6}  {:>10}  {:>18}  {:>6}",
            "Total",
            "",
            format_count(totals.frequency),
            format_count(totals.weighted_frequency),
            format!("{:.1}", totals.percent)
        )?;
        writeln!(out)?;
        for line in wrap_text(ROUNDING_NOTE, WRAP_WIDTH) {
            writeln!(out, "{line}")?;
        }
    }

    Ok(())
}

fn has_count_columns(option: &ResponseOption) -> bool {
    option.frequency.is_some() || option.weighted_frequency.is_some() || option.percent.is_some()
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
