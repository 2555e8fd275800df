//! Task prompt rendering (spec §4.11 step 4): substitutes the two literal
//! placeholders `{report_dir}` and `{timestamp}`. Deliberately distinct from
//! `rcodegen_context::ResolutionContext::substitute`'s `${...}` language —
//! these are resolved before a bundle/context ever exists, since the task
//! runner builds a single ad-hoc step rather than loading a declared bundle.

use std::path::Path;

use chrono::Utc;

/// Render `template`, replacing `{report_dir}` with `report_dir`'s display
/// form and `{timestamp}` with the current UTC time as `YYYY-MM-DD_HHMMSS`.
pub fn render_prompt(template: &str, report_dir: &Path) -> String {
    template
        .replace("{report_dir}", &report_dir.display().to_string())
        .replace("{timestamp}", &Utc::now().format("%Y-%m-%d_%H%M%S").to_string())
}
