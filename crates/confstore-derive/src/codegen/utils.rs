//! Shared utility functions for code generation.

use quote::ToTokens;

/// Render a type the way it is usually written, e.g. `Option<Vec<u8>>`.
pub fn type_display(ty: &syn::Type) -> String {
    let raw = ty.to_token_stream().to_string();
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' {
            let prev = out.chars().last();
            let next = chars.peek().copied();
            let tight_prev = matches!(prev, Some('<' | ':' | '&' | '(' | '['));
            let tight_next = matches!(next, Some('<' | '>' | ':' | ',' | ')' | ']'));
            if tight_prev || tight_next {
                continue;
            }
        }
        out.push(c);
    }
    out
}
