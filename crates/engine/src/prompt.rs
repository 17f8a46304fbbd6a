// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt composition.
//!
//! A pure function: identical inputs yield byte-identical output. The
//! sections carry fixed markers that backends may rely on. When the
//! composed prompt exceeds the byte cap, oldest prior-run tail lines go
//! first, then workspace excerpts shrink, each cut marked explicitly.

use car_core::Ticket;

/// Marker appended wherever content was cut.
pub const TRUNCATION_MARKER: &str = "[truncated]";

/// One workspace document included as prompt context.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptDoc {
    pub name: String,
    pub content: String,
}

/// Byte budgets for prompt composition.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PromptCaps {
    /// Hard cap on the whole prompt.
    pub max_bytes: usize,
    /// Initial per-document excerpt budget.
    pub doc_excerpt_bytes: usize,
}

impl Default for PromptCaps {
    fn default() -> Self {
        Self { max_bytes: 32 * 1024, doc_excerpt_bytes: 8 * 1024 }
    }
}

/// Everything that goes into one prompt.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    /// Identity/constitution header, verbatim.
    pub constitution: &'a str,
    pub workspace_docs: &'a [PromptDoc],
    /// Final delta lines of the previous run, oldest first.
    pub prior_tail: &'a [String],
    pub ticket: &'a Ticket,
}

/// Cut a string to at most `max` bytes on a char boundary.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn render(inputs: &PromptInputs<'_>, doc_budget: usize, tail_skip: usize) -> String {
    let mut out = String::new();

    if !inputs.constitution.is_empty() {
        out.push_str("=== CONSTITUTION ===\n");
        out.push_str(inputs.constitution);
        if !inputs.constitution.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }

    for doc in inputs.workspace_docs {
        out.push_str("=== WORKSPACE: ");
        out.push_str(&doc.name);
        out.push_str(" ===\n");
        let excerpt = truncate_utf8(&doc.content, doc_budget);
        out.push_str(excerpt);
        if excerpt.len() < doc.content.len() {
            if !excerpt.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(TRUNCATION_MARKER);
            out.push('\n');
        } else if !excerpt.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }

    let tail = &inputs.prior_tail[tail_skip.min(inputs.prior_tail.len())..];
    if !tail.is_empty() {
        out.push_str("=== PRIOR RUN TAIL ===\n");
        if tail_skip > 0 {
            out.push_str(TRUNCATION_MARKER);
            out.push('\n');
        }
        for line in tail {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }

    out.push_str("=== TICKET ");
    out.push_str(&inputs.ticket.reference());
    if let Some(title) = &inputs.ticket.front.title {
        out.push_str(": ");
        out.push_str(title);
    }
    out.push_str(" ===\n");
    out.push_str("agent: ");
    out.push_str(&inputs.ticket.front.agent);
    out.push('\n');
    out.push('\n');
    out.push_str(&inputs.ticket.body);
    if !inputs.ticket.body.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Compose the prompt under the given caps.
pub fn compose_prompt(inputs: &PromptInputs<'_>, caps: &PromptCaps) -> String {
    let mut doc_budget = caps.doc_excerpt_bytes;
    let mut tail_skip = 0;

    let mut prompt = render(inputs, doc_budget, tail_skip);
    // Drop oldest prior-tail lines first.
    while prompt.len() > caps.max_bytes && tail_skip < inputs.prior_tail.len() {
        tail_skip += 1;
        prompt = render(inputs, doc_budget, tail_skip);
    }
    // Then shrink workspace excerpts.
    while prompt.len() > caps.max_bytes && doc_budget > 0 {
        doc_budget /= 2;
        prompt = render(inputs, doc_budget, tail_skip);
    }
    prompt
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
