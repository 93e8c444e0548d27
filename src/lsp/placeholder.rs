//! Fixed responses for requests that have no real implementation yet.
//!
//! Hover and completion are advertised so editors wire them up; the answers
//! below keep the protocol shapes a real implementation would return.

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionResponse, Hover, HoverContents, MarkupContent,
    MarkupKind,
};

pub const HOVER_TEXT: &str = "hello world";

pub const COMPLETION_LABEL: &str = "code";
pub const COMPLETION_INSERT_TEXT: &str = "Hello";

pub fn hover() -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::PlainText,
            value: HOVER_TEXT.to_string(),
        }),
        range: None,
    }
}

pub fn completion() -> CompletionResponse {
    CompletionResponse::Array(vec![CompletionItem {
        label: COMPLETION_LABEL.to_string(),
        kind: Some(CompletionItemKind::TEXT),
        insert_text: Some(COMPLETION_INSERT_TEXT.to_string()),
        ..Default::default()
    }])
}
