/// Appends a note to an existing free-text notes field, joined with ` | `.
pub fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing.filter(|n| !n.is_empty()) {
        Some(existing) => format!("{existing} | {note}"),
        None => note.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_separator() {
        assert_eq!(append_note(None, "a"), "a");
        assert_eq!(append_note(Some(""), "a"), "a");
        assert_eq!(append_note(Some("first"), "second"), "first | second");
    }
}
