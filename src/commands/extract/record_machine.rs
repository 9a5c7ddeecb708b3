use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MachineState {
    SeekingIdentifier,
    AccumulatingLabel,
    AccumulatingUniverse,
    AccumulatingField(FieldKind),
    AccumulatingOptions,
}

impl MachineState {
    fn for_field(field: FieldKind) -> Self {
        match field {
            FieldKind::Label => Self::AccumulatingLabel,
            FieldKind::Universe => Self::AccumulatingUniverse,
            other => Self::AccumulatingField(other),
        }
    }

    fn field(self) -> Option<FieldKind> {
        match self {
            Self::AccumulatingLabel => Some(FieldKind::Label),
            Self::AccumulatingUniverse => Some(FieldKind::Universe),
            Self::AccumulatingField(field) => Some(field),
            Self::SeekingIdentifier | Self::AccumulatingOptions => None,
        }
    }
}

#[derive(Debug)]
struct OptionDraft {
    code: String,
    label_parts: Vec<String>,
    frequency: Option<u64>,
    weighted_frequency: Option<u64>,
    percent: Option<f64>,
}

#[derive(Debug)]
struct OpenRecord {
    variable_name: String,
    location: SourceLocation,
    fields: HashMap<FieldKind, Vec<String>>,
    options: Vec<OptionDraft>,
    pending_option_text: Vec<String>,
    // Continuation text went to the last option since it was pushed.
    extended_last_option: bool,
    totals: Option<Totals>,
}

impl OpenRecord {
    fn new(variable_name: String, location: SourceLocation) -> Self {
        Self {
            variable_name,
            location,
            fields: HashMap::new(),
            options: Vec::new(),
            pending_option_text: Vec::new(),
            extended_last_option: false,
            totals: None,
        }
    }

    fn into_record(mut self, config: &ExtractConfig) -> VariableRecord {
        let mut take = |field: FieldKind| self.fields.remove(&field).unwrap_or_default();

        let label = normalize_text(&take(FieldKind::Label), config);
        let universe = normalize_optional(&take(FieldKind::Universe), config);
        let length = normalize_optional(&take(FieldKind::Length), config);
        let position = normalize_optional(&take(FieldKind::Position), config);
        let question_name = normalize_optional(&take(FieldKind::QuestionName), config);
        let concept = normalize_optional(&take(FieldKind::Concept), config);
        let note = normalize_optional(&take(FieldKind::Note), config);
        let source = normalize_optional(&take(FieldKind::Source), config);

        let options = self
            .options
            .into_iter()
            .map(|draft| {
                let label = normalize_text(&draft.label_parts, config);
                ResponseOption {
                    code: Code::canonical(&replace_characters(&draft.code, &config.character_map)),
                    missing: config.missing_kind(&label),
                    label,
                    frequency: draft.frequency,
                    weighted_frequency: draft.weighted_frequency,
                    percent: draft.percent,
                }
            })
            .collect();

        VariableRecord {
            variable_name: self.variable_name,
            label,
            universe,
            length,
            position,
            question_name,
            concept,
            note,
            source,
            options,
            totals: self.totals,
            page: self.location.page,
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct ExtractedRecord {
    pub record: VariableRecord,
    pub location: SourceLocation,
}

#[derive(Debug, Default)]
pub(super) struct MachineOutput {
    pub records: Vec<ExtractedRecord>,
    pub unattached: usize,
}

/// Groups layout lines into variable records.
///
/// An identifier line always opens a new record. Field markers move the
/// machine between the label, universe and other labelled fields; option
/// lines (after the answer table header, when the layout has one) become
/// response options. Dividers and total rows close the open record.
#[derive(Debug)]
pub(super) struct RecordMachine<'a> {
    config: &'a ExtractConfig,
    state: MachineState,
    current: Option<OpenRecord>,
    output: MachineOutput,
}

impl<'a> RecordMachine<'a> {
    pub(super) fn new(config: &'a ExtractConfig) -> Self {
        Self {
            config,
            state: MachineState::SeekingIdentifier,
            current: None,
            output: MachineOutput::default(),
        }
    }

    pub(super) fn run(config: &'a ExtractConfig, lines: &[Line]) -> Result<MachineOutput> {
        let mut machine = Self::new(config);
        for line in lines {
            machine.feed(line)?;
        }
        machine.finish()
    }

    #[cfg(test)]
    pub(super) fn state(&self) -> MachineState {
        self.state
    }

    pub(super) fn feed(&mut self, line: &Line) -> Result<()> {
        if line.kind == LineKind::Divider {
            return self.close_record();
        }

        let config = self.config;
        let text = line.text.trim();
        if text.is_empty() {
            return Ok(());
        }

        if let Some(captures) = config.identifier.captures(text) {
            return self.open_record(&captures, text, line.location());
        }

        if config
            .identifier_marker
            .as_ref()
            .is_some_and(|marker| marker.is_match(text))
        {
            bail!(
                "consistency error: identifier line without a usable variable name at {}: {text:?}",
                line.location()
            );
        }

        if self.current.is_none() {
            return self.unattached(line);
        }

        if config
            .options_header
            .as_ref()
            .is_some_and(|header| header.is_match(text))
        {
            self.state = MachineState::AccumulatingOptions;
            return Ok(());
        }

        if let Some(captures) = config.total.as_ref().and_then(|total| total.captures(text)) {
            let totals = parse_totals(&captures, line.location())?;
            if let Some(record) = self.current.as_mut() {
                record.totals = Some(totals);
            }
            return self.close_record();
        }

        if config.starts_with_marker(text) {
            self.absorb_fields(text, None);
            return Ok(());
        }

        let options_allowed =
            self.state == MachineState::AccumulatingOptions || config.options_header.is_none();
        if options_allowed {
            if let Some(captures) = config.option.captures(text) {
                let draft = parse_option(&captures, line.location())?;
                self.push_option(draft, line.location())?;
                self.state = MachineState::AccumulatingOptions;
                return Ok(());
            }
        }

        if self.state == MachineState::AccumulatingOptions {
            self.extend_option_label(text);
            return Ok(());
        }

        let field = self.state.field();
        self.absorb_fields(text, field);
        Ok(())
    }

    pub(super) fn finish(mut self) -> Result<MachineOutput> {
        self.close_record()?;
        Ok(self.output)
    }

    fn open_record(
        &mut self,
        captures: &regex::Captures<'_>,
        text: &str,
        location: SourceLocation,
    ) -> Result<()> {
        let variable_name = captures
            .name("id")
            .map(|value| value.as_str().trim())
            .unwrap_or_default();
        if variable_name.is_empty() {
            bail!(
                "consistency error: identifier line without a usable variable name at {location}: {text:?}"
            );
        }

        self.close_record()?;

        let mut remainder = captures
            .name("label")
            .map(|value| value.as_str().to_string())
            .unwrap_or_default();
        let matched_end = captures.get(0).map(|value| value.end()).unwrap_or(text.len());
        let tail = &text[matched_end..];
        if !tail.trim().is_empty() {
            remainder.push(' ');
            remainder.push_str(tail);
        }

        debug!(variable = variable_name, location = %location, "opened variable record");
        self.current = Some(OpenRecord::new(variable_name.to_string(), location));
        self.state = MachineState::AccumulatingLabel;
        self.absorb_fields(&remainder, Some(FieldKind::Label));

        Ok(())
    }

    fn absorb_fields(&mut self, text: &str, default_field: Option<FieldKind>) {
        let config = self.config;
        let Some(record) = self.current.as_mut() else {
            return;
        };

        for (marker_field, segment) in config.split_on_markers(text) {
            if let Some(field) = marker_field {
                self.state = MachineState::for_field(field);
            }

            let Some(target) = marker_field.or(default_field) else {
                continue;
            };
            if !segment.is_empty() {
                record
                    .fields
                    .entry(target)
                    .or_default()
                    .push(segment.to_string());
            }
        }
    }

    fn push_option(&mut self, mut draft: OptionDraft, location: SourceLocation) -> Result<()> {
        let Some(record) = self.current.as_mut() else {
            return Ok(());
        };

        // An unlabelled code right after continuation text means the label
        // sat on its own line and was attached to the wrong option.
        if draft.label_parts.is_empty() && record.extended_last_option {
            let previous = record
                .options
                .last()
                .map(|option| option.code.as_str())
                .unwrap_or_default();
            bail!(
                "consistency error: answer code {} in {} at {location} has no label; the text before it was joined to code {previous}",
                draft.code,
                record.variable_name
            );
        }

        record.extended_last_option = false;
        if !record.pending_option_text.is_empty() {
            let mut label_parts = std::mem::take(&mut record.pending_option_text);
            label_parts.append(&mut draft.label_parts);
            draft.label_parts = label_parts;
        }
        record.options.push(draft);
        Ok(())
    }

    // Answer categories that wrap put their code on the first line only.
    fn extend_option_label(&mut self, text: &str) {
        let Some(record) = self.current.as_mut() else {
            return;
        };

        match record.options.last_mut() {
            Some(last) => {
                last.label_parts.push(text.to_string());
                record.extended_last_option = true;
            }
            None => record.pending_option_text.push(text.to_string()),
        }
    }

    fn close_record(&mut self) -> Result<()> {
        self.state = MachineState::SeekingIdentifier;
        let Some(open) = self.current.take() else {
            return Ok(());
        };

        if !open.pending_option_text.is_empty() {
            bail!(
                "consistency error: answer category text {:?} in {} ({}) has no code",
                open.pending_option_text.join(" "),
                open.variable_name,
                open.location
            );
        }

        let location = open.location;
        let record = open.into_record(self.config);
        debug!(
            variable = %record.variable_name,
            options = record.options.len(),
            "closed variable record"
        );
        self.output.records.push(ExtractedRecord { record, location });

        Ok(())
    }

    fn unattached(&mut self, line: &Line) -> Result<()> {
        match self.config.unmatched {
            UnmatchedPolicy::Discard => {
                debug!(
                    location = %line.location(),
                    text = %line.text,
                    "discarding line outside any variable block"
                );
                self.output.unattached += 1;
                Ok(())
            }
            UnmatchedPolicy::Fail => bail!(
                "input format error: line outside any variable block at {}: {:?}",
                line.location(),
                line.text
            ),
        }
    }
}

fn parse_option(captures: &regex::Captures<'_>, location: SourceLocation) -> Result<OptionDraft> {
    let code = captures
        .name("code")
        .map(|value| value.as_str().trim().to_string())
        .unwrap_or_default();
    if code.is_empty() {
        bail!("consistency error: response option without a code at {location}");
    }

    let label = captures
        .name("label")
        .map(|value| value.as_str().trim())
        .unwrap_or_default();

    Ok(OptionDraft {
        code,
        label_parts: if label.is_empty() {
            Vec::new()
        } else {
            vec![label.to_string()]
        },
        frequency: captures
            .name("frequency")
            .map(|value| parse_count(value.as_str(), "frequency", location))
            .transpose()?,
        weighted_frequency: captures
            .name("weighted")
            .map(|value| parse_count(value.as_str(), "weighted frequency", location))
            .transpose()?,
        percent: captures
            .name("percent")
            .map(|value| parse_percent(value.as_str(), location))
            .transpose()?,
    })
}

fn parse_totals(captures: &regex::Captures<'_>, location: SourceLocation) -> Result<Totals> {
    let column = |name: &str| {
        captures
            .name(name)
            .map(|value| value.as_str())
            .with_context(|| format!("input format error: total row at {location} has no {name}"))
    };

    Ok(Totals {
        frequency: parse_count(column("frequency")?, "total frequency", location)?,
        weighted_frequency: parse_count(column("weighted")?, "total weighted frequency", location)?,
        percent: parse_percent(column("percent")?, location)?,
    })
}
