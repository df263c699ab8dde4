//! Prompt assembly.
//!
//! Renders the question and the selected matches into the single
//! instruction string handed to the answer generator. Output is a pure
//! function of the inputs.

use crate::models::{PromptContext, RetrievedMatch};

/// Rendered in place of a scope with no matches.
pub const EMPTY_SECTION: &str = "(none)";

/// Source label for a category match with no document id.
const MISSING_CATEGORY_SOURCE: &str = "cat";

const PREAMBLE: &str = "SYSTEM: You are LegalLens, an assistant that analyzes legal agreements. \
Summarize what the uploaded contract says about repayment, interest, penalties, and obligations. \
Highlight risks and burdens for the borrower in simple language. \
If the document lacks details, say that clearly. \
You may state whether the terms seem strict, flexible, risky, or favorable, but DO NOT directly tell the user \
to take or not take the loan. \
Use subheadings for each section in **bold** format (for example: **Repayment:**, **Interest:**, \
**Penalties:**, **Obligations:**, **Action steps:**).";

const TASK: &str = "TASK:\n\
1) Answer the user's question concisely in plain English.\n\
2) If the user document lacks direct info, use category context and explicitly say 'Using category precedents:'.\n\
3) Provide a short 'Action steps:' section (2-4 bullet points) with the heading in **bold**.\n\
4) Output must be plain text only - no markdown formatting except for the bold subheadings.\n\
\n\
END.";

/// `{n}) [DOC:… | CHUNK:… | PAGES:s-e | SIM:0.00]` followed by the text.
pub fn format_user_block(n: usize, m: &RetrievedMatch) -> String {
    let md = &m.metadata;
    format!(
        "{}) [DOC:{} | CHUNK:{} | PAGES:{}-{} | SIM:{:.2}]\n{}",
        n,
        md.doc_id,
        md.chunk_id,
        md.page_start,
        md.page_end,
        m.score,
        m.text()
    )
}

/// `{n}) [CATEGORY:… | SRC:… | CHUNK:…]` followed by the text.
pub fn format_category_block(n: usize, m: &RetrievedMatch, label: &str) -> String {
    let md = &m.metadata;
    let src = if md.doc_id.is_empty() {
        MISSING_CATEGORY_SOURCE
    } else {
        md.doc_id.as_str()
    };
    format!(
        "{}) [CATEGORY:{} | SRC:{} | CHUNK:{}]\n{}",
        n,
        label,
        src,
        md.chunk_id,
        m.text()
    )
}

fn section<F>(matches: &[RetrievedMatch], render: F) -> String
where
    F: Fn(usize, &RetrievedMatch) -> String,
{
    if matches.is_empty() {
        return EMPTY_SECTION.to_string();
    }
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| render(i + 1, m))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the generator instruction for `question` over `ctx`.
///
/// Layout, in order: the role preamble, the question, the user chunk
/// section, the category section, and the task block. Blocks in a
/// section are numbered from 1 and separated by a blank line.
pub fn assemble(question: &str, ctx: &PromptContext, category_label: &str) -> String {
    let user = section(&ctx.user, format_user_block);
    let category = section(&ctx.category, |n, m| {
        format_category_block(n, m, category_label)
    });

    format!(
        "{PREAMBLE}\n\n\
         USER QUESTION:\n{question}\n\n\
         USER DOCUMENT CHUNKS (highest relevance first):\n{user}\n\n\
         CATEGORY CONTEXT (optional, supporting only if user chunks insufficient):\n{category}\n\n\
         {TASK}"
    )
}
