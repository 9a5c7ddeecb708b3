use super::*;

pub(super) fn validate_collection(records: &[ExtractedRecord], config: &ExtractConfig) -> Result<()> {
    let mut seen: HashMap<&str, SourceLocation> = HashMap::new();

    for extracted in records {
        let record = &extracted.record;
        if record.variable_name.trim().is_empty() {
            bail!(
                "consistency error: record without a variable name at {}",
                extracted.location
            );
        }

        if let Some(first) = seen.insert(record.variable_name.as_str(), extracted.location) {
            bail!(
                "consistency error: duplicate variable name {} at {} (first seen at {})",
                record.variable_name,
                extracted.location,
                first
            );
        }

        validate_option_codes(extracted)?;
        validate_totals(extracted, &config.total_tolerances)?;
    }

    Ok(())
}

fn validate_option_codes(extracted: &ExtractedRecord) -> Result<()> {
    let mut codes = HashSet::new();
    for option in &extracted.record.options {
        if !codes.insert(&option.code) {
            bail!(
                "consistency error: duplicate answer code {} in {} ({})",
                option.code,
                extracted.record.variable_name,
                extracted.location
            );
        }
    }
    Ok(())
}

/// Checks the codebook's printed totals against the summed option rows.
/// Columns where any option lacks a value are not checked.
fn validate_totals(extracted: &ExtractedRecord, tolerances: &TotalTolerances) -> Result<()> {
    let record = &extracted.record;
    let Some(totals) = &record.totals else {
        return Ok(());
    };
    if record.options.is_empty() {
        return Ok(());
    }

    let frequencies = record
        .options
        .iter()
        .map(|option| option.frequency)
        .collect::<Option<Vec<u64>>>();
    if let Some(values) = frequencies {
        check_count_total(
            extracted,
            "frequency",
            &values,
            totals.frequency,
            tolerances.frequency,
        )?;
    }

    let weighted = record
        .options
        .iter()
        .map(|option| option.weighted_frequency)
        .collect::<Option<Vec<u64>>>();
    if let Some(values) = weighted {
        check_count_total(
            extracted,
            "weighted frequency",
            &values,
            totals.weighted_frequency,
            tolerances.weighted_frequency,
        )?;
    }

    let percents = record
        .options
        .iter()
        .map(|option| option.percent)
        .collect::<Option<Vec<f64>>>();
    if let Some(values) = percents {
        let sum = values.iter().sum::<f64>();
        let diff = ((sum - totals.percent).abs() * 100.0).round() / 100.0;
        if diff > tolerances.percent {
            bail!(
                "consistency error: percent total {} of {} ({}) does not match sum {:.2} within {}",
                totals.percent,
                record.variable_name,
                extracted.location,
                sum,
                tolerances.percent
            );
        }
    }

    Ok(())
}

fn check_count_total(
    extracted: &ExtractedRecord,
    column: &str,
    values: &[u64],
    total: u64,
    tolerance: u64,
) -> Result<()> {
    let Some(sum) = values
        .iter()
        .try_fold(0_u64, |acc, value| acc.checked_add(*value))
    else {
        bail!(
            "input format error: {column} column of {} ({}) overflows when summed",
            extracted.record.variable_name,
            extracted.location
        );
    };

    if sum.abs_diff(total) > tolerance {
        bail!(
            "consistency error: {column} total {total} of {} ({}) does not match sum {sum} within {tolerance}",
            extracted.record.variable_name,
            extracted.location
        );
    }
    Ok(())
}
