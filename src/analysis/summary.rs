//! Human-readable digests of classified change sets.

use crate::{
    analysis::classify::aggregate,
    domain::{ClassifiedChange, Severity, Subject},
};

/// The number of example changes named by [`summarize`].
pub const DEFAULT_EXAMPLES: usize = 3;

/// Renders a one-sentence digest of a change set, naming up to
/// [`DEFAULT_EXAMPLES`] example changes.
///
/// See [`summarize_with`].
#[must_use]
pub fn summarize(
    api_name: &str,
    from_version: &str,
    to_version: &str,
    classified: &[ClassifiedChange],
) -> String {
    summarize_with(api_name, from_version, to_version, classified, DEFAULT_EXAMPLES)
}

/// Renders a one-sentence digest of a change set.
///
/// An empty change set yields
/// `No significant change detected between v{from} and v{to}.`
///
/// Otherwise the digest names the version transition, the aggregate change
/// type, a count per severity (most severe first), and up to `examples`
/// concrete changes, most severe first, each with its path. A change of the
/// version string is always mentioned.
#[must_use]
pub fn summarize_with(
    api_name: &str,
    from_version: &str,
    to_version: &str,
    classified: &[ClassifiedChange],
    examples: usize,
) -> String {
    let from = bare_version(from_version);
    let to = bare_version(to_version);

    if classified.is_empty() {
        return format!("No significant change detected between v{from} and v{to}.");
    }

    let impact = aggregate(classified);
    let counts: Vec<String> = Severity::DESCENDING
        .iter()
        .filter_map(|&severity| {
            let count = classified
                .iter()
                .filter(|change| change.severity == severity)
                .count();
            (count > 0).then(|| format!("{count} {severity}"))
        })
        .collect();
    let noun = if classified.len() == 1 { "change" } else { "changes" };
    let named: Vec<String> = pick_examples(classified, examples.max(1))
        .into_iter()
        .map(describe)
        .collect();

    let mut summary = String::new();
    if !api_name.is_empty() {
        summary.push_str(api_name);
        summary.push(' ');
    }
    summary.push_str(&format!(
        "v{from} → v{to} ({}): {} {noun} detected; includes {}.",
        impact.change_type,
        counts.join(", "),
        named.join(", ")
    ));
    summary
}

fn bare_version(version: &str) -> &str {
    version
        .strip_prefix(|c: char| c == 'v' || c == 'V')
        .unwrap_or(version)
}

/// The most severe changes, stable in diff order, plus any version change.
fn pick_examples(classified: &[ClassifiedChange], limit: usize) -> Vec<&ClassifiedChange> {
    let mut ranked: Vec<&ClassifiedChange> = classified.iter().collect();
    ranked.sort_by(|a, b| {
        (b.severity, b.change_type).cmp(&(a.severity, a.change_type))
    });
    ranked.truncate(limit);

    if !ranked
        .iter()
        .any(|change| change.change.subject == Subject::Version)
    {
        if let Some(version) = classified
            .iter()
            .find(|change| change.change.subject == Subject::Version)
        {
            ranked.push(version);
        }
    }
    ranked
}

fn describe(classified: &ClassifiedChange) -> String {
    let change = &classified.change;
    if change.description.contains(&change.path) {
        change.description.clone()
    } else {
        format!("{} ({})", change.description, change.path)
    }
}
