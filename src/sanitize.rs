//! Text cleanup applied to every inbound report field.

pub fn sanitize_text_field(raw: &str) -> String {
    let untagged = strip_tags(&strip_script_style(raw));
    let decoded = strip_percent_octets(&untagged);
    collapse_whitespace(&decoded)
}

const DROPPED_ELEMENTS: [&str; 2] = ["script", "style"];

/// Removes whole `<script>`/`<style>` elements, body included. An opening tag
/// without its closing tag is left for `strip_tags`.
fn strip_script_style(input: &str) -> String {
    // ASCII lowercasing keeps byte offsets, so positions map back onto `input`.
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some((start, name)) = DROPPED_ELEMENTS
        .iter()
        .filter_map(|name| lower[pos..].find(&format!("<{name}")).map(|i| (pos + i, *name)))
        .min_by_key(|(start, _)| *start)
    {
        let after_name = start + 1 + name.len();
        let close = format!("</{name}>");
        let element_end = lower[after_name..].find('>').and_then(|gt| {
            let body = after_name + gt + 1;
            lower[body..].find(&close).map(|c| body + c + close.len())
        });
        match element_end {
            Some(end) => {
                out.push_str(&input[pos..start]);
                pos = end;
            }
            None => {
                out.push_str(&input[pos..after_name]);
                pos = after_name;
            }
        }
    }
    out.push_str(&input[pos..]);
    out
}

fn starts_tag(next: Option<char>) -> bool {
    matches!(next, Some(c) if c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?')
}

fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '<' {
            out.push(c);
            continue;
        }
        if starts_tag(chars.peek().copied()) {
            // An unterminated tag swallows the rest of the input.
            for skipped in chars.by_ref() {
                if skipped == '>' {
                    break;
                }
            }
        } else {
            out.push_str("&lt;");
        }
    }
    out
}

fn strip_percent_octets(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while let Some(rest) = input.get(i..) {
        let Some(c) = rest.chars().next() else {
            break;
        };
        if c == '%'
            && bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
            && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit)
        {
            i += 3;
            continue;
        }
        out.push(c);
        i += c.len_utf8();
    }
    out
}

fn collapse_whitespace(input: &str) -> String {
    input
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncates on a character boundary so stored values respect column widths.
pub fn clamp_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(sanitize_text_field("Panaji Fire Station"), "Panaji Fire Station");
    }

    #[test]
    fn strips_markup() {
        assert_eq!(
            sanitize_text_field("<b>Mapusa</b> <script>alert(1)</script>market"),
            "Mapusa market"
        );
        assert_eq!(sanitize_text_field("<!-- note -->Vasco"), "Vasco");
        assert_eq!(sanitize_text_field("Ponda <i unterminated"), "Ponda");
    }

    #[test]
    fn drops_script_and_style_bodies() {
        assert_eq!(
            sanitize_text_field("<script>alert(1)</script>Mapusa<style>b{}</style>"),
            "Mapusa"
        );
        assert_eq!(
            sanitize_text_field("<SCRIPT type=\"text/javascript\">x()</Script>Calangute"),
            "Calangute"
        );
        assert_eq!(
            sanitize_text_field("Anjuna <style media=\"all\">p { color: red }</STYLE>beach"),
            "Anjuna beach"
        );
    }

    #[test]
    fn unclosed_script_keeps_its_text() {
        assert_eq!(sanitize_text_field("<script>Siolim"), "Siolim");
    }

    #[test]
    fn encodes_lone_less_than() {
        assert_eq!(sanitize_text_field("depth < 3m"), "depth &lt; 3m");
    }

    #[test]
    fn removes_percent_octets() {
        assert_eq!(sanitize_text_field("Margao%20Town%0A"), "MargaoTown");
        assert_eq!(sanitize_text_field("100% burnt"), "100% burnt");
    }

    #[test]
    fn collapses_line_breaks_and_control_characters() {
        assert_eq!(
            sanitize_text_field("  Fire\r\n at\tgodown\u{0007}  "),
            "Fire at godown"
        );
        assert_eq!(sanitize_text_field("\n\t "), "");
    }

    #[test]
    fn clamps_on_char_boundaries() {
        assert_eq!(clamp_chars("abcdef", 3), "abc");
        assert_eq!(clamp_chars("ab", 3), "ab");
        assert_eq!(clamp_chars("गोवा", 2), "गो");
    }
}
