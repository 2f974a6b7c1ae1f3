//! Sanitization boundary helpers ("information firewall").
//!
//! The firewall is a structural contract, not a runtime filter: every
//! handler converts raw output to natural language *before* returning,
//! because post-hoc scanning cannot tell a fabricated raw value from a
//! legitimate number. These helpers back that contract: `scrub` is the
//! conversion step's last pass inside a handler, and `find_marker` is the
//! testable consequence: finished summaries carry none of the raw-syntax
//! markers below.

/// Raw-syntax markers that must never appear in a finished summary.
///
/// Matched case-insensitively. Covers query syntax, serialized payload
/// fences, and the common stack-trace shapes of the runtimes behind the
/// analysis backend.
pub const FORBIDDEN_MARKERS: &[&str] = &[
    "select ",
    "insert into",
    "delete from",
    "update ",
    "group by",
    "order by",
    "```",
    "traceback (most recent call last)",
    "stack trace",
    "panicked at",
    "ora-",
    "syntaxerror",
    "nameerror",
];

const DIAGRAM_FENCE: &str = "```mermaid";

/// Scan a summary for forbidden raw-syntax markers.
///
/// When `allow_diagram` is set (diagram-flagged results only), a fenced
/// ```mermaid block is tolerated; every other marker still trips.
pub fn find_marker(summary: &str, allow_diagram: bool) -> Option<&'static str> {
    let lower = summary.to_ascii_lowercase();
    let scan = if allow_diagram {
        strip_diagram_fences(&lower)
    } else {
        lower
    };

    FORBIDDEN_MARKERS
        .iter()
        .find(|marker| scan.contains(*marker))
        .copied()
}

pub fn is_clean(summary: &str, allow_diagram: bool) -> bool {
    find_marker(summary, allow_diagram).is_none()
}

/// Remove fenced code blocks and collapse whitespace.
///
/// Handlers run their model-produced summary through this before
/// returning, so a model that ignores its no-code instruction still
/// cannot leak a fence across the boundary.
pub fn scrub(text: &str) -> String {
    // Pieces between ``` markers alternate outside/inside a fence. An
    // unclosed trailing fence drops its content rather than leaking it.
    let mut kept = String::with_capacity(text.len());
    for (i, piece) in text.split("```").enumerate() {
        if i % 2 == 0 {
            kept.push_str(piece);
        }
    }

    let mut out = String::with_capacity(kept.len());
    for line in kept.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() && out.ends_with("\n\n") {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }

    out.trim().to_string()
}

/// Strip the mermaid fence line and its closing fence so the remaining
/// text can be scanned with the full marker set.
fn strip_diagram_fences(lower: &str) -> String {
    let mut out = String::with_capacity(lower.len());
    let mut in_diagram = false;

    for line in lower.lines() {
        let trimmed = line.trim_start();
        if !in_diagram && trimmed.starts_with(DIAGRAM_FENCE) {
            in_diagram = true;
            continue;
        }
        if in_diagram && trimmed.starts_with("```") {
            in_diagram = false;
            continue;
        }
        if in_diagram {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_prose_passes() {
        let summary = "The records show 15,234 male patients, about 48% of all episodes.";
        assert!(is_clean(summary, false));
    }

    #[test]
    fn query_syntax_trips() {
        let summary = "I ran SELECT count(*) FROM episodes and got 15234.";
        assert_eq!(find_marker(summary, false), Some("select "));
    }

    #[test]
    fn code_fence_trips() {
        let summary = "Here is the code:\n```python\nprint(1)\n```";
        assert_eq!(find_marker(summary, false), Some("```"));
    }

    #[test]
    fn stack_trace_trips() {
        let summary = "Traceback (most recent call last):\n  File \"<stdin>\"";
        assert!(!is_clean(summary, false));
    }

    #[test]
    fn diagram_fence_allowed_only_when_flagged() {
        let summary = "Admission flow overview.\n\n```mermaid\nflowchart TD\n  A --> B\n```";
        assert!(is_clean(summary, true));
        assert!(!is_clean(summary, false));
    }

    #[test]
    fn diagram_allowance_does_not_excuse_other_markers() {
        let summary =
            "Derived via SELECT * queries.\n\n```mermaid\nflowchart TD\n  A --> B\n```";
        assert_eq!(find_marker(summary, true), Some("select "));
    }

    #[test]
    fn scrub_removes_fenced_blocks() {
        let text = "Found three clusters.\n```python\nimport pandas\n```\nLargest holds 60%.";
        let scrubbed = scrub(text);
        assert_eq!(scrubbed, "Found three clusters.\n\nLargest holds 60%.");
        assert!(is_clean(&scrubbed, false));
    }

    #[test]
    fn scrub_is_idempotent_on_clean_text() {
        let text = "Two sentences.\n\nNothing technical here.";
        assert_eq!(scrub(text), text);
    }

    // Property check from the firewall contract: whatever raw payload a
    // summarizer was given, the scrubbed output never carries a fence or
    // an unclosed fence remnant.
    #[test]
    fn scrub_never_leaks_fences_across_synthetic_outputs() {
        let raw_payloads = [
            "```sql\nSELECT * FROM episodes WHERE age > 65\n```",
            "result:\n```\n{\"count\": 15234}\n```\ntrailing prose",
            "```python\nimport os\nos.system('ls')",
            "no fences at all, just prose",
            "```\n```\n```\nodd number of fences```",
        ];

        for (i, payload) in raw_payloads.iter().enumerate() {
            let summary = scrub(&format!("Finding {i}: {payload}"));
            assert!(
                !summary.contains("```"),
                "payload {i} leaked a fence: {summary:?}"
            );
        }
    }
}
