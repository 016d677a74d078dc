//! Prompt templates
//!
//! Placeholders use the `${NAME}` form and are filled by [`render`] in a
//! single pass, so text pulled from emails or tool results is never itself
//! treated as a template.

/// Opening line of every prompt
pub const PERSONA: &str = "You are Bob, a friendly and helpful assistant running on a Raspberry Pi. \
You answer emails from people you know.";

/// How to call tools, with the catalog listed under it
pub const TOOL_INSTRUCTIONS: &str = r#"You can use tools to look things up or take actions. Only use a tool when you need information or an action you cannot provide yourself.
To call a tool, write it on its own line exactly like this:
[TOOL:tool_name]{"parameter": "value"}
You may call at most ${MAX_CALLS} tools in one reply. When you call tools, write nothing else; you will receive the results and can answer afterwards.

Available tools:
${TOOL_LIST}"#;

/// Reply framing
pub const ENVELOPE_RULES: &str = r#"Begin your reply with "${SALUTATION} <name>," and end it with "Sincerely, ${SIGNATURE}"."#;

pub const INITIAL: &str = "${PERSONA}\n\n${TOOLS}\n\n${ENVELOPE}\n\nRequest:\n${USER_PROMPT}";

pub const PLAIN: &str = "${PERSONA}\n\n${ENVELOPE}\n\nRequest:\n${USER_PROMPT}";

pub const INTERMEDIATE_HEAD: &str = "${PERSONA}\n\n${TOOLS}\n\n${ENVELOPE}\n\nRequest:\n${USER_PROMPT}\n\n\
This is step ${ITERATION}. Below are the results of the tools you called and a summary of earlier steps. \
If you still need information, call another tool you have not called yet. Otherwise write your final reply.\n\n";

pub const FINAL_HEAD: &str = "${PERSONA}\n\n\
Do not call any tools. Do not write [TOOL:...] lines or JSON tool requests. \
Using the information gathered below, write your final reply to the request. \
If an image was generated, refer to it as [image: <filename>].\n\n\
${ENVELOPE}\n\nRequest:\n${USER_PROMPT}\n\n";

pub const SUMMARY_HEAD: &str = "Condense the information below into a short summary of at most ${MAX_WORDS} words. \
Keep names, numbers, ids, links and file names. Do not add anything new. \
Reply with only the summary text.\n\nRequest:\n${USER_PROMPT}\n\n";

/// Tail sections, newest material first so truncation drops the oldest
pub const RESULTS_SECTION: &str = "Tool results:\n${TOOL_RESULTS}\n\n";
pub const SUMMARY_SECTION: &str = "Summary of earlier steps:\n${SUMMARY}";
pub const RESPONSE_SECTION: &str = "Latest response:\n${RESPONSE}\n\n";
pub const PREVIOUS_SUMMARY_SECTION: &str = "Previous summary:\n${SUMMARY}";

/// Substitute `${NAME}` placeholders in one pass. Unknown names are left as is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match vars.iter().find(|(key, _)| *key == name) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(render("Hi ${NAME}!", &[("NAME", "Nate")]), "Hi Nate!");
        assert_eq!(render("${A}${B}", &[("A", "1"), ("B", "2")]), "12");
    }

    #[test]
    fn test_render_is_single_pass() {
        let out = render("Request: ${USER_PROMPT}", &[("USER_PROMPT", "say ${SECRET}"), ("SECRET", "x")]);
        assert_eq!(out, "Request: say ${SECRET}");
    }

    #[test]
    fn test_render_unknown_and_unclosed() {
        assert_eq!(render("${UNKNOWN} ok", &[]), "${UNKNOWN} ok");
        assert_eq!(render("broken ${NAME", &[("NAME", "x")]), "broken ${NAME");
    }
}
