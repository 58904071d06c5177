use crate::fixes::FixOutcome;
use colored::Colorize;

/// Renders a fix run's outcome for humans
pub struct FixReporter;

impl FixReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, outcome: &FixOutcome, dry_run: bool) {
        if outcome.is_clean() {
            println!("No version discrepancies found.");
            return;
        }

        if !outcome.applied.is_empty() {
            let verb = if dry_run { "would change" } else { "updated" };
            println!("{} line(s) {}:", outcome.applied.len(), verb);
            for fix in &outcome.applied {
                println!("  {}  {}", fix.abspath.display(), fix.line.yellow());
            }
        }

        if !outcome.resolvable_shared.is_empty() {
            println!();
            println!("Pins in shared files, applied across every venv:");
            for resolvable in &outcome.resolvable_shared {
                println!("  {}", resolvable.nudge_lock);
            }
        }

        if !outcome.unresolvables.is_empty() {
            println!();
            println!("{}", "Unresolvable discrepancies, pin by hand:".red());
            for issue in &outcome.unresolvables {
                println!("  {}", issue.pkg_name.red());
                println!("    declared: {}", issue.specifiers.join(", "));
                let mut seen: Vec<String> =
                    issue.others.iter().map(ToString::to_string).collect();
                seen.push(issue.highest.to_string());
                println!("    versions seen: {}", seen.join(", "));
            }
        }

        if !outcome.unsupported.is_empty() {
            println!();
            println!("{}", "Not reconciled automatically:".yellow());
            for (pkg_name, err) in &outcome.unsupported {
                println!("  {pkg_name}: {}", err.to_string().dimmed());
            }
        }
    }
}

impl Default for FixReporter {
    fn default() -> Self {
        Self::new()
    }
}
