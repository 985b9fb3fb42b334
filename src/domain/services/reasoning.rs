#[cfg(test)]
#[path = "reasoning_test.rs"]
mod tests;

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Removes `<think>...</think>` reasoning blocks that reasoning models put in
/// front of their answer. A closing tag without an opening one means the
/// chat template already opened the block, so everything before it is
/// reasoning. An unterminated block runs to the end of the text.
pub fn strip_reasoning(text: &str) -> String {
    let mut rest = text;
    if let (Some(close), open) = (rest.find(CLOSE_TAG), rest.find(OPEN_TAG)) {
        if open.map_or(true, |open| return open > close) {
            rest = &rest[close + CLOSE_TAG.len()..];
        }
    }

    let mut res = String::with_capacity(rest.len());
    while let Some(open) = rest.find(OPEN_TAG) {
        res.push_str(&rest[..open]);
        let after_open = &rest[open + OPEN_TAG.len()..];
        match after_open.find(CLOSE_TAG) {
            Some(close) => rest = &after_open[close + CLOSE_TAG.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    res.push_str(rest);

    return res.trim().to_string();
}
