//! Text cleanup for scraped fields.

/// Collapse whitespace runs, strip control characters, and trim.
pub fn clean_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = true;
    for ch in input.chars() {
        if ch.is_control() || ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Clean a list of names, dropping entries that clean down to nothing.
pub fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| clean_text(s))
        .filter(|s| !s.is_empty())
        .collect()
}
