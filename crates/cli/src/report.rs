use command_segmenter::{Command, CommandTree, Diagnostic, Segmentation};

const PREVIEW_CHARS: usize = 72;

/// One line per command: line span, kind and a one-line preview
pub fn render_text(result: &Segmentation) -> String {
    let mut out = String::new();
    for command in &result.commands {
        out.push_str(&format!(
            "{:>5}-{:<5} {:<14} {}\n",
            command.start_line,
            command.end_line,
            command.kind.as_str(),
            preview(command)
        ));
    }
    out
}

/// Commands nested by span containment, two spaces per level
pub fn render_tree(result: &Segmentation) -> String {
    let tree = CommandTree::build(&result.commands);
    let mut out = String::new();
    tree.walk(|command, depth| {
        out.push_str(&format!(
            "{}{} [{}-{}] {}\n",
            "  ".repeat(depth),
            command.kind,
            command.start_line,
            command.end_line,
            preview(command)
        ));
    });
    out
}

pub fn describe(diagnostic: &Diagnostic) -> String {
    match diagnostic {
        Diagnostic::UnterminatedRegion { kind, start } => {
            format!("unterminated {kind} at byte {start}")
        }
        Diagnostic::UnterminatedCommand { kind, start } => {
            format!("unterminated {kind} at byte {start} was dropped")
        }
        Diagnostic::DanglingMarker { kind, start } => {
            format!("{kind} marker at byte {start} precedes no statement")
        }
        Diagnostic::DepthLimit { kind, start, depth } => {
            format!("{kind} at byte {start} (depth {depth}) was not descended into")
        }
    }
}

fn preview(command: &Command) -> String {
    truncate_one_line(&command.text, PREVIEW_CHARS)
}

fn truncate_one_line(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let truncated: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{truncated}…")
}
