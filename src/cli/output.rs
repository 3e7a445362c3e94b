//! User-facing output of the CLI.
//!
//! Headings and diffs are colored when stdout is a terminal; errors go to
//! stderr as miette reports.

use crate::errors::HqlError;
use crate::macros::{ExpansionStep, MacroProvenance};
use difference::{Changeset, Difference};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn color_choice(stream: atty::Stream) -> ColorChoice {
    if atty::is(stream) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

fn stdout() -> StandardStream {
    StandardStream::stdout(color_choice(atty::Stream::Stdout))
}

fn heading(out: &mut StandardStream, color: Color, text: &str) {
    let _ = out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = writeln!(out, "{}", text);
    let _ = out.reset();
}

/// Prints an expansion trace: the first rewrite in full, then each later
/// one as a line diff against the previous output.
pub fn print_trace(trace: &[ExpansionStep]) {
    let mut out = stdout();
    if trace.is_empty() {
        let _ = writeln!(out, "no macro invocations");
        return;
    }

    let mut previous = String::new();
    for (i, step) in trace.iter().enumerate() {
        heading(
            &mut out,
            Color::Yellow,
            &format!(
                "--- step {}: {} ({}, depth {}) ---",
                i,
                step.macro_name,
                provenance_label(step.provenance),
                step.depth
            ),
        );
        let input = step.input.value.pretty();
        let current = step.output.value.pretty();
        let before = if i == 0 { input } else { previous };
        let changeset = Changeset::new(&before, &current, "\n");
        print_diff(&mut out, &changeset.diffs);
        previous = current;
        let _ = writeln!(out);
    }
}

fn print_diff(out: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        let (color, prefix, text) = match diff {
            Difference::Same(x) => (None, ' ', x),
            Difference::Add(x) => (Some(Color::Green), '+', x),
            Difference::Rem(x) => (Some(Color::Red), '-', x),
        };
        let _ = out.set_color(ColorSpec::new().set_fg(color));
        for line in text.lines() {
            let _ = writeln!(out, "{}{}", prefix, line);
        }
    }
    let _ = out.reset();
}

pub fn provenance_label(provenance: MacroProvenance) -> &'static str {
    match provenance {
        MacroProvenance::Core => "core",
        MacroProvenance::User => "user",
        MacroProvenance::Imported => "imported",
    }
}

pub fn print_macros(macros: &[(String, MacroProvenance)]) {
    let mut out = stdout();
    heading(&mut out, Color::Cyan, "Macros:");
    for (name, provenance) in macros {
        let _ = writeln!(out, "  {:<10} {}", name, provenance_label(*provenance));
    }
}

/// Prints a per-file check result.
pub fn print_status(path: &str, failures: usize) {
    let mut out = stdout();
    let (color, label) = if failures == 0 {
        (Color::Green, "ok")
    } else {
        (Color::Red, "FAILED")
    };
    let _ = out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(out, "{:>6}", label);
    let _ = out.reset();
    let _ = writeln!(out, " {}", path);
}

pub fn print_summary(text: &str, ok: bool) {
    let mut out = stdout();
    heading(&mut out, if ok { Color::Green } else { Color::Red }, text);
}

/// Prints each diagnostic with its source excerpt.
pub fn print_diagnostics(errors: &[HqlError]) {
    for error in errors {
        crate::errors::print_error(error.clone());
    }
}
