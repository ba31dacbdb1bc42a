use std::collections::{BTreeMap, HashMap};
use std::io::IsTerminal;

use junit_trace_core::model::span::SpanRecord;
use owo_colors::OwoColorize;

pub fn print_trace_log_human(spans: &[SpanRecord]) {
    let color = std::io::stdout().is_terminal();
    let traces = group_by_trace(spans);
    for (trace_id, spans) in &traces {
        print_trace_human(trace_id, spans, color);
    }
    println!("-- {} traces ({} spans) --", traces.len(), spans.len());
}

fn group_by_trace(spans: &[SpanRecord]) -> BTreeMap<&str, Vec<&SpanRecord>> {
    let mut traces: BTreeMap<&str, Vec<&SpanRecord>> = BTreeMap::new();
    for span in spans {
        traces.entry(span.trace_id.as_str()).or_default().push(span);
    }
    traces
}

fn print_trace_human(trace_id: &str, spans: &[&SpanRecord], color: bool) {
    let duration_ms = match (
        spans.iter().map(|s| s.start_ts).min(),
        spans.iter().map(|s| s.end_ts).max(),
    ) {
        (Some(first), Some(last)) => (last - first).num_milliseconds(),
        _ => 0,
    };
    let errors = spans.iter().filter(|s| s.is_error()).count();
    println!(
        "TRACE {} service={} duration={}ms spans={} errors={}",
        trace_id,
        spans.first().map(|s| s.service.as_str()).unwrap_or("-"),
        duration_ms,
        spans.len(),
        errors
    );
    print_span_tree(spans, color);
}

/// Spans whose parent is missing from the log are printed as roots.
fn print_span_tree(spans: &[&SpanRecord], color: bool) {
    let known: Vec<&str> = spans.iter().map(|s| s.span_id.as_str()).collect();
    let mut children: HashMap<Option<&str>, Vec<&SpanRecord>> = HashMap::new();
    for span in spans {
        let parent = span
            .parent_span_id
            .as_deref()
            .filter(|parent| known.contains(parent));
        children.entry(parent).or_default().push(span);
    }
    for kids in children.values_mut() {
        kids.sort_by_key(|s| s.start_ts);
    }
    if let Some(roots) = children.get(&None) {
        for root in roots {
            print_node(root, &children, 0, color);
        }
    }
}

fn print_node(
    span: &SpanRecord,
    children: &HashMap<Option<&str>, Vec<&SpanRecord>>,
    depth: usize,
    color: bool,
) {
    let indent = "  ".repeat(depth);
    let status = if !color {
        span.status.clone()
    } else if span.is_error() {
        span.status.red().to_string()
    } else {
        span.status.green().to_string()
    };
    println!("{indent}{} ({}ms) {status}", span.name, span.duration_ms());

    if let Some(kids) = children.get(&Some(span.span_id.as_str())) {
        for child in kids {
            print_node(child, children, depth + 1, color);
        }
    }
}
