use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum FieldKind {
    Label,
    Universe,
    Length,
    Position,
    QuestionName,
    Concept,
    Note,
    Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct FieldMarker {
    pub field: FieldKind,
    pub marker: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct MissingLabel {
    pub prefix: String,
    pub kind: MissingKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct PageRange {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct TotalTolerances {
    pub frequency: u64,
    pub weighted_frequency: u64,
    pub percent: f64,
}

impl Default for TotalTolerances {
    fn default() -> Self {
        Self {
            frequency: 0,
            weighted_frequency: 1,
            percent: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum UnmatchedPolicy {
    Discard,
    Fail,
}

/// Uncompiled matching rules for one codebook layout. Profiles provide the
/// defaults and a JSON config file may replace any top-level key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ConfigSpec {
    pub identifier: String,
    /// Start of an identifier line. A line matching this but not
    /// `identifier` is a variable whose name could not be read.
    pub identifier_marker: Option<String>,
    pub option: String,
    pub options_header: Option<String>,
    pub total: Option<String>,
    pub discard: Vec<String>,
    pub field_markers: Vec<FieldMarker>,
    pub missing_labels: Vec<MissingLabel>,
    pub character_map: BTreeMap<String, String>,
    pub divider_left: Option<i64>,
    pub line_tolerance: i64,
    pub page_range: Option<PageRange>,
    pub total_tolerances: TotalTolerances,
}

impl ConfigSpec {
    pub(super) fn for_profile(profile: LayoutProfile) -> Self {
        match profile {
            LayoutProfile::Generic => Self::generic(),
            LayoutProfile::Clps => Self::clps(),
        }
    }

    fn generic() -> Self {
        Self {
            identifier: r"^(?P<id>[A-Z][A-Z0-9_]*)\s*:\s*(?P<label>.*)$".to_string(),
            identifier_marker: None,
            option: r"^(?P<code>-?\d+)[.)]?\s+(?P<label>\S.*)$".to_string(),
            options_header: None,
            total: None,
            discard: vec![
                r"^Page\s+\d+(?:\s+of\s+\d+)?$".to_string(),
                r"^-\s*\d+\s*-$".to_string(),
            ],
            field_markers: standard_field_markers(),
            missing_labels: standard_missing_labels(),
            character_map: standard_character_map(),
            divider_left: None,
            line_tolerance: 5,
            page_range: None,
            total_tolerances: TotalTolerances::default(),
        }
    }

    /// Statistics Canada CLPS 2021 PUMF data dictionary.
    fn clps() -> Self {
        Self {
            identifier: r"^Variable Name:\s*(?P<id>[A-Z][A-Z0-9_]*)".to_string(),
            identifier_marker: Some(r"^Variable Name:".to_string()),
            option: concat!(
                r"^(?P<label>.*?)\s*(?P<code>-?\d+)\s+(?P<frequency>\d[\d,]*)",
                r"\s+(?P<weighted>\d[\d,]*)\s+(?P<percent>\d+(?:\.\d+)?)$"
            )
            .to_string(),
            options_header: Some(r"^Answer Categories\b".to_string()),
            total: Some(
                r"^Total\s+(?P<frequency>\d[\d,]*)\s+(?P<weighted>\d[\d,]*)\s+(?P<percent>\d+(?:\.\d+)?)$"
                    .to_string(),
            ),
            discard: vec![
                r"CLPS 2021 - Data Dictionary".to_string(),
                r"Totals may not add up due to rounding".to_string(),
                r"^Page\s+\d+\s*-\s*\d+$".to_string(),
            ],
            field_markers: standard_field_markers(),
            missing_labels: standard_missing_labels(),
            character_map: standard_character_map(),
            divider_left: Some(36),
            line_tolerance: 5,
            page_range: Some(PageRange {
                start: 9,
                end: 126,
            }),
            total_tolerances: TotalTolerances::default(),
        }
    }

    pub(super) fn with_overrides(self, overrides: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(overrides) = overrides else {
            bail!("configuration error: config file must contain a JSON object");
        };

        let mut merged =
            serde_json::to_value(&self).context("failed to serialize base configuration")?;
        if let serde_json::Value::Object(base) = &mut merged {
            for (key, value) in overrides {
                base.insert(key, value);
            }
        }

        serde_json::from_value(merged)
            .context("configuration error: config file does not describe a valid extraction configuration")
    }
}

fn standard_field_markers() -> Vec<FieldMarker> {
    [
        (FieldKind::Length, "Length:"),
        (FieldKind::Position, "Position:"),
        (FieldKind::QuestionName, "Question Name:"),
        (FieldKind::Concept, "Concept:"),
        (FieldKind::Label, "Question Text:"),
        (FieldKind::Universe, "Universe:"),
        (FieldKind::Note, "Note:"),
        (FieldKind::Source, "Source:"),
    ]
    .into_iter()
    .map(|(field, marker)| FieldMarker {
        field,
        marker: marker.to_string(),
    })
    .collect()
}

fn standard_missing_labels() -> Vec<MissingLabel> {
    [
        ("valid skip", MissingKind::ValidSkip),
        ("don't know", MissingKind::DontKnow),
        ("refusal", MissingKind::Refusal),
        ("refused", MissingKind::Refusal),
        ("not stated", MissingKind::NotStated),
    ]
    .into_iter()
    .map(|(prefix, kind)| MissingLabel {
        prefix: prefix.to_string(),
        kind,
    })
    .collect()
}

// Characters pdfminer is known to emit in place of plain text.
fn standard_character_map() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("\u{FB01}".to_string(), "fi".to_string()),
        ("\u{2019}".to_string(), "'".to_string()),
    ])
}

#[derive(Debug, Clone)]
pub(super) struct ExtractConfig {
    pub profile: LayoutProfile,
    pub identifier: Regex,
    pub identifier_marker: Option<Regex>,
    pub option: Regex,
    pub options_header: Option<Regex>,
    pub total: Option<Regex>,
    pub discard: Vec<Regex>,
    pub field_markers: Vec<FieldMarker>,
    pub missing_labels: Vec<MissingLabel>,
    pub character_map: Vec<(String, String)>,
    pub divider_left: Option<i64>,
    pub line_tolerance: i64,
    pub page_range: Option<PageRange>,
    pub total_tolerances: TotalTolerances,
    pub unmatched: UnmatchedPolicy,
    pub allow_empty: bool,
    marker_split: Option<Regex>,
    hyphen_break: Regex,
}

impl ExtractConfig {
    pub(super) fn for_profile(profile: LayoutProfile) -> Result<Self> {
        Self::compile(profile, &ConfigSpec::for_profile(profile))
    }

    pub(super) fn compile(profile: LayoutProfile, spec: &ConfigSpec) -> Result<Self> {
        let identifier = compile_pattern("identifier", &spec.identifier)?;
        require_groups("identifier", &identifier, &["id"])?;

        let identifier_marker = spec
            .identifier_marker
            .as_deref()
            .map(|pattern| compile_pattern("identifier_marker", pattern))
            .transpose()?;

        let option = compile_pattern("option", &spec.option)?;
        require_groups("option", &option, &["code"])?;

        let options_header = spec
            .options_header
            .as_deref()
            .map(|pattern| compile_pattern("options_header", pattern))
            .transpose()?;

        let total = spec
            .total
            .as_deref()
            .map(|pattern| compile_pattern("total", pattern))
            .transpose()?;
        if let Some(total) = &total {
            require_groups("total", total, &["frequency", "weighted", "percent"])?;
        }

        let discard = spec
            .discard
            .iter()
            .map(|pattern| compile_pattern("discard", pattern))
            .collect::<Result<Vec<Regex>>>()?;

        if spec.field_markers.iter().any(|marker| marker.marker.trim().is_empty()) {
            bail!("configuration error: field markers must not be empty");
        }

        if spec.line_tolerance < 0 {
            bail!(
                "configuration error: line_tolerance must be non-negative, got {}",
                spec.line_tolerance
            );
        }

        if let Some(range) = spec.page_range {
            if range.start > range.end {
                bail!(
                    "configuration error: page_range start {} is after end {}",
                    range.start,
                    range.end
                );
            }
        }

        Ok(Self {
            profile,
            identifier,
            identifier_marker,
            option,
            options_header,
            total,
            discard,
            marker_split: build_marker_split(&spec.field_markers)?,
            field_markers: spec.field_markers.clone(),
            missing_labels: spec
                .missing_labels
                .iter()
                .map(|label| MissingLabel {
                    prefix: label.prefix.to_lowercase(),
                    kind: label.kind,
                })
                .collect(),
            character_map: spec
                .character_map
                .iter()
                .map(|(from, to)| (from.clone(), to.clone()))
                .collect(),
            divider_left: spec.divider_left,
            line_tolerance: spec.line_tolerance,
            page_range: spec.page_range,
            total_tolerances: spec.total_tolerances,
            unmatched: UnmatchedPolicy::Discard,
            allow_empty: false,
            hyphen_break: Regex::new(r"([a-z])- ([a-z])")
                .context("failed to compile hyphenation regex")?,
        })
    }

    pub(super) fn is_discarded(&self, text: &str) -> bool {
        self.discard.iter().any(|pattern| pattern.is_match(text))
    }

    /// Splits `text` at every field marker that starts the text or follows
    /// whitespace. The first segment carries no field; each following
    /// segment belongs to the marker that opened it.
    pub(super) fn split_on_markers<'t>(&self, text: &'t str) -> Vec<(Option<FieldKind>, &'t str)> {
        let Some(splitter) = &self.marker_split else {
            return vec![(None, text.trim())];
        };

        let mut segments = Vec::new();
        let mut current = None;
        let mut cursor = 0;

        for captures in splitter.captures_iter(text) {
            let Some(marker) = captures.name("marker") else {
                continue;
            };
            segments.push((current, text[cursor..marker.start()].trim()));
            current = self.field_for_marker(marker.as_str());
            cursor = marker.end();
        }
        segments.push((current, text[cursor..].trim()));

        segments
    }

    pub(super) fn starts_with_marker(&self, text: &str) -> bool {
        self.field_markers
            .iter()
            .any(|marker| text.starts_with(marker.marker.as_str()))
    }

    pub(super) fn missing_kind(&self, label: &str) -> Option<MissingKind> {
        let lowered = label.to_lowercase();
        self.missing_labels
            .iter()
            .find(|missing| lowered.starts_with(missing.prefix.as_str()))
            .map(|missing| missing.kind)
    }

    pub(super) fn hyphen_break(&self) -> &Regex {
        &self.hyphen_break
    }

    fn field_for_marker(&self, marker: &str) -> Option<FieldKind> {
        self.field_markers
            .iter()
            .find(|candidate| candidate.marker == marker)
            .map(|candidate| candidate.field)
    }
}

fn compile_pattern(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .with_context(|| format!("configuration error: invalid {name} pattern {pattern:?}"))
}

fn require_groups(name: &str, regex: &Regex, groups: &[&str]) -> Result<()> {
    for group in groups {
        if !regex.capture_names().flatten().any(|candidate| candidate == *group) {
            bail!("configuration error: {name} pattern must define a `{group}` capture group");
        }
    }
    Ok(())
}

fn build_marker_split(markers: &[FieldMarker]) -> Result<Option<Regex>> {
    if markers.is_empty() {
        return Ok(None);
    }

    let mut literals = markers
        .iter()
        .map(|marker| marker.marker.as_str())
        .collect::<Vec<&str>>();
    literals.sort_by_key(|literal| std::cmp::Reverse(literal.len()));

    let alternation = literals
        .iter()
        .map(|literal| regex::escape(literal))
        .collect::<Vec<String>>()
        .join("|");

    let splitter = Regex::new(&format!(r"(?:^|\s)(?P<marker>{alternation})"))
        .context("configuration error: failed to compile field marker splitter")?;
    Ok(Some(splitter))
}

pub(super) fn load_config(args: &ExtractArgs) -> Result<ExtractConfig> {
    let mut spec = ConfigSpec::for_profile(args.profile);

    if let Some(path) = &args.config {
        let raw = fs::read(path)
            .with_context(|| format!("configuration error: failed to read {}", path.display()))?;
        let overrides: serde_json::Value = serde_json::from_slice(&raw)
            .with_context(|| format!("configuration error: failed to parse {}", path.display()))?;
        spec = spec
            .with_overrides(overrides)
            .with_context(|| format!("failed to apply {}", path.display()))?;
        info!(path = %path.display(), "applied configuration overrides");
    }

    let mut config = ExtractConfig::compile(args.profile, &spec)?;
    if args.strict {
        config.unmatched = UnmatchedPolicy::Fail;
    }
    config.allow_empty = args.allow_empty;

    Ok(config)
}
