//! Request field validation and sanitising.
//!
//! Handlers collect every field problem into a [`Validator`] and reject the
//! request once with the full list, so clients can highlight all bad fields.

use serde::Serialize;

/// Where a rejected value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Body,
    Params,
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub location: Location,
    pub msg: String,
}

impl FieldError {
    pub fn new(path: &str, location: Location, msg: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            location,
            msg: msg.into(),
        }
    }
}

/// Accumulates field errors for a single request.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trimmed body field whose length (in characters) must lie in `min..=max`.
    pub fn required(
        &mut self,
        path: &str,
        value: Option<&str>,
        min: usize,
        max: usize,
    ) -> Option<String> {
        let trimmed = value.unwrap_or("").trim();
        self.check_length(path, trimmed, min, max)
    }

    /// Like [`Validator::required`] but an absent field is accepted as `None`.
    pub fn optional(
        &mut self,
        path: &str,
        value: Option<&str>,
        min: usize,
        max: usize,
    ) -> Option<String> {
        value.and_then(|v| self.check_length(path, v.trim(), min, max))
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn check_length(&mut self, path: &str, value: &str, min: usize, max: usize) -> Option<String> {
        let len = value.chars().count();
        if len < min || len > max {
            self.errors.push(FieldError::new(
                path,
                Location::Body,
                format!("must be between {} and {} characters", min, max),
            ));
            return None;
        }
        Some(value.to_string())
    }
}

/// HTML-escape the characters browsers treat specially.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(c),
        }
    }
    out
}

/// First `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
