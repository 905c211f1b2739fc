use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FENCED_JSON: Regex = Regex::new(r"(?is)```json\s*(.*?)\s*```").unwrap();
    static ref FENCED_ANY: Regex = Regex::new(r"(?s)```\s*(.*?)\s*```").unwrap();
}

/// Locate and parse a JSON object embedded anywhere in a model response.
///
/// Attempts, in order: a ```json fenced block, any fenced block, then a
/// first-`{`/last-`}` slice of the candidate to shave off stray prose. A
/// failed strict parse is retried once with C0/C1 control characters removed.
/// Returns `None` when nothing parses; that means "plain conversational
/// reply", not an error.
///
/// Spurious braces outside the real block can defeat the slice. Best-effort,
/// accepted.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    if text.is_empty() {
        return None;
    }

    let mut candidate = FENCED_JSON
        .captures(text)
        .or_else(|| FENCED_ANY.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    if let (Some(first), Some(last)) = (candidate.find('{'), candidate.rfind('}')) {
        if last > first {
            candidate = &candidate[first..=last];
        }
    }

    match serde_json::from_str(candidate) {
        Ok(value) => Some(value),
        Err(_) => {
            let cleaned: String = candidate.chars().filter(|c| !is_control(*c)).collect();
            serde_json::from_str(&cleaned).ok()
        }
    }
}

/// Remove ```json fenced blocks from text shown to the user.
pub fn strip_json_fences(text: &str) -> String {
    FENCED_JSON.replace_all(text, "").trim().to_string()
}

fn is_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}
