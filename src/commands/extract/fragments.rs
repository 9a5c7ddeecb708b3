use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum FragmentKind {
    Text,
    Divider,
}

/// One positioned element of the pdf2txt.py HTML output. Positions are in
/// px and absolute over the whole document, so `(top, left)` order is
/// reading order.
#[derive(Debug, Clone, Serialize)]
pub(super) struct Fragment {
    pub kind: FragmentKind,
    pub text: String,
    pub page: u32,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub bold: bool,
}

impl Fragment {
    pub(super) fn bottom(&self) -> i64 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy)]
struct Geometry {
    left: i64,
    top: i64,
    width: i64,
    height: i64,
}

#[derive(Debug)]
struct StyleParser {
    left: Regex,
    top: Regex,
    width: Regex,
    height: Regex,
    font_family: Regex,
    font_size: Regex,
}

impl StyleParser {
    fn new() -> Result<Self> {
        Ok(Self {
            left: style_length_regex("left")?,
            top: style_length_regex("top")?,
            width: style_length_regex("width")?,
            height: style_length_regex("height")?,
            font_family: Regex::new(r"font-family:\s*([^;]+)")
                .context("failed to compile font-family regex")?,
            font_size: Regex::new(r"font-size:\s*(\d+(?:\.\d+)?)px")
                .context("failed to compile font-size regex")?,
        })
    }

    fn length(regex: &Regex, style: &str) -> Option<i64> {
        regex
            .captures(style)
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<i64>().ok())
    }

    fn geometry(&self, style: &str) -> Option<Geometry> {
        Some(Geometry {
            left: Self::length(&self.left, style)?,
            top: Self::length(&self.top, style)?,
            width: Self::length(&self.width, style)?,
            height: Self::length(&self.height, style)?,
        })
    }

    fn font_family(&self, style: &str) -> Option<String> {
        self.font_family
            .captures(style)
            .and_then(|captures| captures.get(1))
            .map(|value| value.as_str().trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn font_size(&self, style: &str) -> Option<f32> {
        self.font_size
            .captures(style)
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<f32>().ok())
    }
}

fn style_length_regex(property: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?:^|[;\s]){property}:\s*(-?\d+)(?:\.\d+)?px"))
        .with_context(|| format!("failed to compile {property} style regex"))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow!("failed to compile selector {css:?}: {err:?}"))
}

fn snippet(element: &ElementRef<'_>) -> String {
    let html = element.html();
    let mut out = html.chars().take(160).collect::<String>();
    if out.len() < html.len() {
        out.push_str("...");
    }
    out
}

/// Decodes the top-level `div`/`span` elements of pdf2txt.py HTML output
/// into fragments sorted in reading order.
pub(super) fn parse_fragments(html: &str, config: &ExtractConfig) -> Result<Vec<Fragment>> {
    let document = Html::parse_document(html);
    let top_level = selector("body > div, body > span")?;
    let page_anchor = selector("a[name]")?;
    let any_anchor = selector("a")?;
    let styled_span = selector("span[style]")?;
    let styles = StyleParser::new()?;

    let mut fragments = Vec::new();
    let mut page = 0_u32;
    let mut saw_start_page = false;

    for (index, element) in document.select(&top_level).enumerate() {
        if let Some(anchor) = element.select(&page_anchor).next() {
            let name = anchor.value().attr("name").unwrap_or_default().trim();
            page = name.parse::<u32>().with_context(|| {
                format!("input format error: page anchor with non-numeric name {name:?}")
            })?;
            if config.page_range.is_some_and(|range| range.start == page) {
                saw_start_page = true;
            }
            continue;
        }

        if let Some(range) = config.page_range {
            if page < range.start {
                continue;
            }
            if page > range.end {
                debug!(page, end = range.end, "reached end of configured page range");
                break;
            }
        }

        let tag = element.value().name();
        let style = element.value().attr("style").with_context(|| {
            format!(
                "input format error: element #{index} on page {page} has no style attribute: {}",
                snippet(&element)
            )
        })?;

        match tag {
            "div" => {
                if element.select(&any_anchor).next().is_some() {
                    // page index links at the end of the document
                    continue;
                }

                let geometry = styles.geometry(style).with_context(|| {
                    format!(
                        "input format error: text box #{index} on page {page} has no left/top/width/height: {}",
                        snippet(&element)
                    )
                })?;

                let text = element.text().collect::<String>();
                if text.trim().is_empty() {
                    continue;
                }

                let font_style = element
                    .select(&styled_span)
                    .filter_map(|span| span.value().attr("style"))
                    .find(|span_style| span_style.contains("font-family"));
                let font_family = font_style.and_then(|value| styles.font_family(value));
                let font_size = font_style.and_then(|value| styles.font_size(value));
                let bold = font_family
                    .as_deref()
                    .is_some_and(|family| family.contains("Bold"));

                fragments.push(Fragment {
                    kind: FragmentKind::Text,
                    text,
                    page,
                    left: geometry.left,
                    top: geometry.top,
                    width: geometry.width,
                    height: geometry.height,
                    font_family,
                    font_size,
                    bold,
                });
            }
            "span" => {
                if style.contains("font-family") {
                    let text = element.text().collect::<String>();
                    if text.trim().is_empty() {
                        continue;
                    }
                    let (Some(left), Some(top)) = (
                        StyleParser::length(&styles.left, style),
                        StyleParser::length(&styles.top, style),
                    ) else {
                        bail!(
                            "input format error: text span #{index} on page {page} has no left/top: {}",
                            snippet(&element)
                        );
                    };
                    let font_family = styles.font_family(style);
                    let bold = font_family
                        .as_deref()
                        .is_some_and(|family| family.contains("Bold"));
                    fragments.push(Fragment {
                        kind: FragmentKind::Text,
                        text,
                        page,
                        left,
                        top,
                        width: StyleParser::length(&styles.width, style).unwrap_or(0),
                        height: StyleParser::length(&styles.height, style).unwrap_or(0),
                        font_size: styles.font_size(style),
                        font_family,
                        bold,
                    });
                    continue;
                }

                // Remaining spans are drawn rules and boxes; only the
                // zero-height rules at the divider column separate variables.
                let Some(geometry) = styles.geometry(style) else {
                    continue;
                };
                let is_divider = geometry.height == 0
                    && config.divider_left.is_some_and(|left| left == geometry.left);
                if !is_divider {
                    continue;
                }

                fragments.push(Fragment {
                    kind: FragmentKind::Divider,
                    text: String::new(),
                    page,
                    left: geometry.left,
                    top: geometry.top,
                    width: geometry.width,
                    height: geometry.height,
                    font_family: None,
                    font_size: None,
                    bold: false,
                });
            }
            _ => {}
        }
    }

    if let Some(range) = config.page_range {
        if !saw_start_page {
            bail!(
                "input format error: page anchor for start page {} not found",
                range.start
            );
        }
    }

    if fragments.is_empty() {
        bail!(
            "input format error: no positioned text fragments found; expected pdf2txt.py --output_type html output"
        );
    }

    fragments.sort_by_key(|fragment| (fragment.top, fragment.left));
    debug!(fragments = fragments.len(), "parsed layout fragments");

    Ok(fragments)
}
