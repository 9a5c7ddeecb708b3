use super::*;

#[derive(Debug)]
pub(super) struct Extraction {
    pub records: Vec<VariableRecord>,
    pub fragment_count: usize,
    pub line_count: usize,
    pub discarded: usize,
    pub unattached: usize,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let config = load_config(&args)?;

    info!(
        input = %args.cdbk_html.display(),
        profile = config.profile.as_str(),
        "starting extraction"
    );

    let html = fs::read_to_string(&args.cdbk_html).with_context(|| {
        format!(
            "input format error: failed to read {}",
            args.cdbk_html.display()
        )
    })?;

    let debug_artifacts = if args.debug {
        Some(DebugArtifacts::new(&args.debug_dir)?)
    } else {
        None
    };

    let extraction = extract_records(&html, &config, debug_artifacts.as_ref())?;

    write_json_pretty(&args.output, &extraction.records)?;

    if let Some(artifacts) = &debug_artifacts {
        artifacts.write_manifest(&args, &config, &extraction)?;
    }

    if extraction.unattached > 0 {
        warn!(
            unattached = extraction.unattached,
            "discarded lines outside any variable block"
        );
    }
    info!(
        path = %args.output.display(),
        records = extraction.records.len(),
        discarded = extraction.discarded,
        "extraction completed"
    );

    Ok(())
}

/// Runs the whole pipeline in memory. Nothing is returned unless every
/// record passed validation.
pub(super) fn extract_records(
    html: &str,
    config: &ExtractConfig,
    debug_artifacts: Option<&DebugArtifacts>,
) -> Result<Extraction> {
    let fragments = parse_fragments(html, config)?;
    if let Some(artifacts) = debug_artifacts {
        artifacts.write("fragments.json", &fragments)?;
    }

    let assembly = assemble_lines(&fragments, config);
    if let Some(artifacts) = debug_artifacts {
        artifacts.write("lines.json", &assembly.lines)?;
    }

    let output = RecordMachine::run(config, &assembly.lines)?;
    if let Some(artifacts) = debug_artifacts {
        let drafts = output
            .records
            .iter()
            .map(|extracted| &extracted.record)
            .collect::<Vec<&VariableRecord>>();
        artifacts.write("records.json", &drafts)?;
    }

    validate_collection(&output.records, config)?;

    if output.records.is_empty() && !config.allow_empty {
        bail!(
            "input format error: no variable identifiers found in {} lines; pass --allow-empty to accept an empty collection",
            assembly.lines.len()
        );
    }

    Ok(Extraction {
        records: output
            .records
            .into_iter()
            .map(|extracted| extracted.record)
            .collect(),
        fragment_count: fragments.len(),
        line_count: assembly.lines.len(),
        discarded: assembly.discarded,
        unattached: output.unattached,
    })
}
