use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum LineKind {
    Text,
    Divider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(super) struct SourceLocation {
    pub page: u32,
    pub line_no: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}, line {}", self.page, self.line_no)
    }
}

/// A visual row of the page: every text piece whose top lies within the
/// line tolerance of the row's first piece, joined left to right.
#[derive(Debug, Clone, Serialize)]
pub(super) struct Line {
    pub kind: LineKind,
    pub text: String,
    pub page: u32,
    pub line_no: usize,
    pub top: i64,
    pub left: i64,
    pub bold: bool,
}

impl Line {
    pub(super) fn location(&self) -> SourceLocation {
        SourceLocation {
            page: self.page,
            line_no: self.line_no,
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct LineAssembly {
    pub lines: Vec<Line>,
    pub discarded: usize,
}

#[derive(Debug, Clone)]
struct Piece {
    kind: LineKind,
    text: String,
    page: u32,
    top: i64,
    left: i64,
    bold: bool,
}

pub(super) fn assemble_lines(fragments: &[Fragment], config: &ExtractConfig) -> LineAssembly {
    let mut assembly = LineAssembly::default();
    let mut pieces = Vec::new();

    for fragment in fragments {
        if fragment.kind == FragmentKind::Divider {
            pieces.push(Piece {
                kind: LineKind::Divider,
                text: String::new(),
                page: fragment.page,
                top: fragment.top,
                left: fragment.left,
                bold: false,
            });
            continue;
        }

        // A text box spanning several lines is split evenly over its height.
        let raw_lines = fragment.text.lines().collect::<Vec<&str>>();
        let step = (fragment.bottom() - fragment.top) / raw_lines.len().max(1) as i64;

        for (offset, raw_line) in raw_lines.iter().enumerate() {
            let text = raw_line.trim();
            if text.is_empty() {
                continue;
            }

            if config.is_discarded(text) {
                debug!(page = fragment.page, text = %text, "discarding header/footer text");
                assembly.discarded += 1;
                continue;
            }

            pieces.push(Piece {
                kind: LineKind::Text,
                text: text.to_string(),
                page: fragment.page,
                top: fragment.top + offset as i64 * step,
                left: fragment.left,
                bold: fragment.bold,
            });
        }
    }

    pieces.sort_by_key(|piece| (piece.top, piece.left));

    let mut line_numbers: HashMap<u32, usize> = HashMap::new();
    let mut row: Vec<Piece> = Vec::new();

    for piece in pieces {
        if piece.kind == LineKind::Divider {
            flush_row(&mut row, &mut line_numbers, &mut assembly.lines);
            let line_no = next_line_no(&mut line_numbers, piece.page);
            assembly.lines.push(Line {
                kind: LineKind::Divider,
                text: piece.text,
                page: piece.page,
                line_no,
                top: piece.top,
                left: piece.left,
                bold: false,
            });
            continue;
        }

        let starts_new_row = row.first().is_some_and(|first| {
            first.page != piece.page || piece.top - first.top > config.line_tolerance
        });
        if starts_new_row {
            flush_row(&mut row, &mut line_numbers, &mut assembly.lines);
        }
        row.push(piece);
    }
    flush_row(&mut row, &mut line_numbers, &mut assembly.lines);

    debug!(
        lines = assembly.lines.len(),
        discarded = assembly.discarded,
        "assembled layout lines"
    );

    assembly
}

fn next_line_no(line_numbers: &mut HashMap<u32, usize>, page: u32) -> usize {
    let counter = line_numbers.entry(page).or_insert(0);
    *counter += 1;
    *counter
}

fn flush_row(row: &mut Vec<Piece>, line_numbers: &mut HashMap<u32, usize>, lines: &mut Vec<Line>) {
    if row.is_empty() {
        return;
    }

    let top = row[0].top;
    let page = row[0].page;
    row.sort_by_key(|piece| piece.left);

    let text = row
        .iter()
        .map(|piece| piece.text.as_str())
        .collect::<Vec<&str>>()
        .join(" ");
    let left = row[0].left;
    let bold = row.iter().all(|piece| piece.bold);

    lines.push(Line {
        kind: LineKind::Text,
        text,
        page,
        line_no: next_line_no(line_numbers, page),
        top,
        left,
        bold,
    });
    row.clear();
}
