//! Rendering of appraisal results and errors for the CLI surface.

pub mod human;
pub mod robot;

use colored::Colorize;

use crate::error::BrickvalError;

/// Render an error with its stable code and category for stderr.
#[must_use]
pub fn render_error(err: &BrickvalError, no_color: bool) -> String {
    if no_color {
        colored::control::set_override(false);
    }
    let rendered = format!(
        "{} [{}] {}",
        "error:".red().bold(),
        err.error_code(),
        err
    );
    if no_color {
        colored::control::unset_override();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rendering_includes_code() {
        let err = BrickvalError::Network("connection refused".to_string());
        let text = render_error(&err, true);
        assert!(text.contains("BVAL-U004"));
        assert!(text.contains("connection refused"));
    }
}
