//! Coloured terminal output for the dogfood tool.
//!
//! Uses `termcolor` for cross-platform colored terminal output.
//! Respects `NO_COLOR` environment variable and `--color` flag.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Styled output writer for terminal.
pub struct StyledOutput {
    stdout: StandardStream,
}

impl StyledOutput {
    /// Create a new styled output with the given color choice.
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
        }
    }

    fn write_styled(&mut self, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = self.stdout.set_color(&spec);
        let _ = write!(self.stdout, "{}", text);
        let _ = self.stdout.reset();
    }

    /// Green bold status word followed by a plain message, e.g.
    /// `   Bundled dist/app (3 modules)`.
    pub fn status(&mut self, verb: &str, message: &str) {
        self.write_styled(&format!("{:>10} ", verb), Some(Color::Green), true);
        let _ = writeln!(self.stdout, "{}", message);
    }

    /// `label: value` with a dimmed label.
    pub fn field(&mut self, label: &str, value: &str) {
        self.write_styled(&format!("{:<14}", format!("{}:", label)), Some(Color::White), false);
        let _ = writeln!(self.stdout, "{}", value);
    }

    /// One line of the module table printed by `inspect`.
    pub fn module_row(&mut self, role: &str, name: &str, offset: u64, size: u64) {
        let color = if role == "entry" { Color::Yellow } else { Color::Cyan };
        self.write_styled(&format!("  {:<8}", role), Some(color), role == "entry");
        let _ = writeln!(self.stdout, "{:<32} {:>#12x} {:>10}", name, offset, size);
    }

    /// Bold heading line.
    pub fn heading(&mut self, text: &str) {
        self.write_styled(text, None, true);
        let _ = writeln!(self.stdout);
    }

    /// Flush stdout.
    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}
