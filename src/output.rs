//! Console output formatting.
//!
//! Every user-facing console line goes through [`OutputFormatter`], so the
//! glyphs and colors stay consistent between real runs and dry runs. Each
//! call prints a whole line at once; lines from concurrent workers may come
//! in any order but are never split.

use colored::*;
use std::collections::HashMap;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Info messages (cyan)
/// - Dry-run notices (yellow)
/// - Summary tables with statistics
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dropsort::output::OutputFormatter;
    /// OutputFormatter::success("photo.jpg → Images");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dropsort::output::OutputFormatter;
    /// OutputFormatter::error("Failed: photo.jpg");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a summary table with file statistics by category.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dropsort::output::OutputFormatter;
    /// use std::collections::HashMap;
    ///
    /// let mut counts = HashMap::new();
    /// counts.insert("Documents".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(category_counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        for line in summary_lines(category_counts, total_files) {
            println!("{}", line);
        }
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Builds the summary table rows, sorted by category name.
fn summary_lines(category_counts: &HashMap<String, usize>, total_files: usize) -> Vec<String> {
    let mut categories: Vec<_> = category_counts.iter().collect();
    categories.sort_by_key(|&(name, _)| name);

    // At least "Category" width
    let width = categories
        .iter()
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0)
        .max(8);

    let mut lines = Vec::with_capacity(categories.len() + 4);
    lines.push(format!(
        "{:<width$} | {}",
        "Category".bold(),
        "Files".bold(),
        width = width
    ));
    lines.push("-".repeat(width + 10));

    for (category, count) in categories {
        lines.push(format!(
            "{:<width$} | {} {}",
            category,
            count.to_string().green(),
            plural(*count),
            width = width
        ));
    }

    lines.push("-".repeat(width + 10));
    lines.push(format!(
        "{:<width$} | {} {}",
        "Total".bold(),
        total_files.to_string().green().bold(),
        plural(total_files),
        width = width
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines_sorted_with_totals() {
        colored::control::set_override(false);

        let mut counts = HashMap::new();
        counts.insert("Music".to_string(), 1);
        counts.insert("Documents".to_string(), 3);

        let lines = summary_lines(&counts, 4);

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Category  | Files");
        assert_eq!(lines[2], "Documents | 3 files");
        assert_eq!(lines[3], "Music     | 1 file");
        assert_eq!(lines[5], "Total     | 4 files");
    }
}
