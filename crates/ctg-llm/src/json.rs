/// Extract a JSON object from an LLM response that may be wrapped in one or
/// more markdown code fences or surrounded by prose.
///
/// Tries in order:
/// 1. Direct parse of the entire string.
/// 2. The contents of each ``` ... ``` fenced block, in order -- models
///    sometimes precede the real answer with a fenced example or an
///    unrelated snippet, so the first fence isn't always the right one.
/// 3. The first balanced `{ ... }` span found anywhere in the text, tracking
///    string literals so braces quoted inside a JSON string value (e.g. a
///    `risk_warnings[].description` mentioning a code block) don't throw off
///    the depth count the way a naive `find('{')`/`rfind('}')` pair would.
pub fn extract_json<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    if let Ok(val) = serde_json::from_str::<T>(raw) {
        return Some(val);
    }

    for block in fenced_blocks(raw) {
        if let Ok(val) = serde_json::from_str::<T>(block.trim()) {
            return Some(val);
        }
    }

    if let Some(span) = first_balanced_object(raw) {
        if let Ok(val) = serde_json::from_str::<T>(span) {
            return Some(val);
        }
    }

    None
}

/// Returns the contents of every ``` ... ``` fenced block in `raw`, in
/// order, stripping an optional language tag from the opening line.
fn fenced_blocks(raw: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_open[body_start..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(&body[..close]);
        rest = &body[close + 3..];
    }
    blocks
}

/// Finds the first `{` and returns the span up to its matching `}`,
/// skipping over braces that appear inside quoted strings.
fn first_balanced_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, b) in raw.bytes().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
