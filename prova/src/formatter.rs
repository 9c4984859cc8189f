//! Plain-text reports for failed runs.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use crate::config::VerbosityLevel;
use crate::report::{ExecutionStatus, ExecutionTree, RunDetails, RunStatus};

const HINT_VERBOSE: &str =
    "Enable verbose mode in order to have the list of all failing values encountered during the run";
const HINT_VERY_VERBOSE: &str = "Enable verbose mode at level VeryVerbose in order to check all generated values and their associated status";

struct Report {
    message: String,
    details: Option<String>,
    hints: Vec<&'static str>,
}

impl Report {
    fn render(self) -> String {
        let mut rendered = self.message;
        if let Some(details) = self.details {
            rendered.push_str("\n\n");
            rendered.push_str(&details);
        }
        if !self.hints.is_empty() {
            rendered.push_str("\n\n");
            rendered.push_str(&format_hints(&self.hints));
        }
        rendered
    }
}

fn format_hints(hints: &[&str]) -> String {
    if let [hint] = hints {
        return format!("Hint: {}", hint);
    }
    hints
        .iter()
        .enumerate()
        .map(|(index, hint)| format!("Hint ({}): {}", index + 1, hint))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_failures<'d, T>(failures: &'d [T], stringify: &mut dyn FnMut(&'d T) -> String) -> String {
    let failures: Vec<String> = failures.iter().map(|value| stringify(value)).collect();
    format!("Encountered failures were:\n- {}", failures.join("\n- "))
}

fn summary_lines<'d, T>(
    trees: &'d [ExecutionTree<T>],
    depth: usize,
    stringify: &mut dyn FnMut(&'d T) -> String,
    lines: &mut Vec<String>,
) {
    for tree in trees {
        let icon = match tree.status {
            ExecutionStatus::Success => '\u{221A}',
            ExecutionStatus::Failure => '\u{D7}',
            ExecutionStatus::Skipped => '!',
        };
        let padding = ". ".repeat(depth - 1);
        lines.push(format!("{}{} {}", padding, icon, stringify(&tree.value)));
        summary_lines(&tree.children, depth + 1, stringify, lines);
    }
}

fn format_execution_summary<'d, T>(
    trees: &'d [ExecutionTree<T>],
    stringify: &mut dyn FnMut(&'d T) -> String,
) -> String {
    let mut lines = Vec::new();
    summary_lines(trees, 1, stringify, &mut lines);
    format!("Execution summary:\n{}", lines.join("\n"))
}

fn too_many_skips<'d, T>(
    details: &'d RunDetails<T>,
    stringify: &mut dyn FnMut(&'d T) -> String,
) -> Report {
    let message = format!(
        "Failed to run property, too many pre-condition failures encountered\n{{ seed: {} }}\n\nRan {} time(s)\nSkipped {} time(s)",
        details.seed, details.num_runs, details.num_skips
    );
    let mut report = Report {
        message,
        details: None,
        hints: vec![
            "Try to reduce the number of rejected values by combining map, chain and built-in arbitraries",
            "Increase failure tolerance by setting max_skips_per_run to an higher value",
        ],
    };
    if details.verbose >= VerbosityLevel::VeryVerbose {
        report.details = Some(format_execution_summary(&details.execution_summary, stringify));
    } else {
        report.hints.push(HINT_VERY_VERBOSE);
    }
    report
}

fn property_failure<'d, T>(
    details: &'d RunDetails<T>,
    stringify: &mut dyn FnMut(&'d T) -> String,
) -> Report {
    let counterexample = match &details.counterexample {
        Some(value) => stringify(value),
        None => String::new(),
    };
    let message = format!(
        "Property failed after {} tests\n{{ seed: {}, path: \"{}\", end_on_failure: true }}\nCounterexample: {}\nShrunk {} time(s)\nGot error: {}",
        details.num_runs,
        details.seed,
        details.counterexample_path.as_deref().unwrap_or_default(),
        counterexample,
        details.num_shrinks,
        details.error.as_deref().unwrap_or_default(),
    );
    let mut report = Report {
        message,
        details: None,
        hints: Vec::new(),
    };
    match details.verbose {
        VerbosityLevel::VeryVerbose => {
            report.details = Some(format_execution_summary(&details.execution_summary, stringify))
        }
        VerbosityLevel::Verbose => {
            report.details = Some(format_failures(&details.failures, stringify))
        }
        VerbosityLevel::None => report.hints.push(HINT_VERBOSE),
    }
    report
}

fn interrupted<'d, T>(
    details: &'d RunDetails<T>,
    stringify: &mut dyn FnMut(&'d T) -> String,
) -> Report {
    let message = format!(
        "Property interrupted after {} tests\n{{ seed: {} }}",
        details.num_runs, details.seed
    );
    let mut report = Report {
        message,
        details: None,
        hints: Vec::new(),
    };
    if details.verbose >= VerbosityLevel::VeryVerbose {
        report.details = Some(format_execution_summary(&details.execution_summary, stringify));
    } else {
        report.hints.push(HINT_VERY_VERBOSE);
    }
    report
}

fn render<'d, T>(
    details: &'d RunDetails<T>,
    stringify: &mut dyn FnMut(&'d T) -> String,
) -> Option<String> {
    if !details.failed {
        return None;
    }
    let report = match details.status {
        RunStatus::Failure => property_failure(details, stringify),
        RunStatus::Interrupted => interrupted(details, stringify),
        RunStatus::TooManySkips => too_many_skips(details, stringify),
        RunStatus::Success => return None,
    };
    Some(report.render())
}

/// Report of a failed run, `None` when the run did not fail.
///
/// Values are rendered with their `Debug` implementation.
pub fn default_report_message<T: fmt::Debug>(details: &RunDetails<T>) -> Option<String> {
    render(details, &mut |value| format!("{:?}", value))
}

/// Report of a failed run using an asynchronous stringifier.
///
/// The report is first rendered with `Debug` while recording every value it shows.
/// Each of them is then passed to `stringify`; the report is rendered a second time
/// only if one of those renderings differs from its `Debug` one.
pub async fn async_default_report_message<T, F, Fut>(
    details: &RunDetails<T>,
    stringify: F,
) -> Option<String>
where
    T: fmt::Debug,
    F: Fn(&T) -> Fut,
    Fut: Future<Output = String>,
{
    let mut shown: Vec<(&T, String)> = Vec::new();
    let first = render(details, &mut |value| {
        let rendered = format!("{:?}", value);
        shown.push((value, rendered.clone()));
        rendered
    })?;

    // Values are keyed by address: they all live inside `details`
    let mut rendered: HashMap<usize, String> = HashMap::new();
    let mut changed = false;
    for (value, sync) in shown {
        let asynchronous = stringify(value).await;
        changed |= asynchronous != sync;
        rendered.insert(value as *const T as usize, asynchronous);
    }
    if !changed {
        return Some(first);
    }
    render(details, &mut |value| {
        match rendered.get(&(value as *const T as usize)) {
            Some(asynchronous) => asynchronous.clone(),
            None => format!("{:?}", value),
        }
    })
}
