use std::path::Path;

use anyhow::{anyhow, Context};

use crate::pipeline::chunk::Chunk;
use crate::pipeline::session::TranslationUnit;

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
pub const DEFAULT_REQUEST: &str = "request.txt";

/// Instructions every request carries, whatever template is configured.
pub const REQUEST_RULES: &str = r#"Rules:
1. Do NOT translate, rename, add or remove keys. Keys are the quoted text left of each colon; copy them unchanged.
2. Preserve every formatting and escape sequence inside the values exactly, byte for byte: %s, %d, %1$s, {0}, \n, and color/format codes such as §a or §l.
3. Reply with ONLY the translated JSON object. No explanations, no comments, no code fences, no text before or after it."#;

pub const DEFAULT_REQUEST_TEXT: &str = r#"Translate the values of the JSON object below into {{target_name}}.
{{part_line}}
{{rules}}

Resource: {{identifier}}

{{block}}"#;

/// Renders chunks into request payloads for the external translator.
#[derive(Clone, Debug)]
pub struct RequestFormatter {
    template: String,
    target_name: String,
}

impl RequestFormatter {
    pub fn new(target_name: impl Into<String>) -> Self {
        Self {
            template: DEFAULT_REQUEST_TEXT.to_string(),
            target_name: target_name.into(),
        }
    }

    pub fn with_template(
        template: impl Into<String>,
        target_name: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let mut template = template.into();
        if !template.contains("{{block}}") {
            return Err(anyhow!("request template has no {{{{block}}}} placeholder"));
        }
        // The rules and the part line are not optional: put them in front
        // when a custom template leaves them out.
        let mut head = String::new();
        if !template.contains("{{part_line}}") {
            head.push_str("{{part_line}}");
        }
        if !template.contains("{{rules}}") {
            head.push_str("{{rules}}\n\n");
        }
        template.insert_str(0, &head);
        Ok(Self {
            template,
            target_name: target_name.into(),
        })
    }

    pub fn from_template_file(path: &Path, target_name: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read request template: {}", path.display()))?;
        Self::with_template(text, target_name)
            .with_context(|| format!("request template: {}", path.display()))
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn format(&self, chunk: &Chunk, unit: &TranslationUnit) -> String {
        let part_line = if chunk.is_multipart() {
            format!(
                "This is part {} of {}. Translate only this part; the other parts come in separate messages.\n",
                chunk.ordinal(),
                chunk.total()
            )
        } else {
            String::new()
        };
        let block = chunk.entries().to_pretty_json();
        render_template(
            &self.template,
            &[
                ("target_name", &self.target_name),
                ("part_line", &part_line),
                ("rules", REQUEST_RULES),
                ("identifier", unit.identifier()),
                ("block", &block),
            ],
        )
    }
}

/// Substitutes `{{name}}` placeholders in a single pass, so substituted text
/// that happens to contain `{{...}}` is left alone.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let replaced = after.find("}}").and_then(|end| {
            let name = &after[..end];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v, &after[end + 2..]))
        });
        match replaced {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![(DEFAULT_REQUEST, DEFAULT_REQUEST_TEXT)]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::keymap::KeyMap;
    use crate::pipeline::chunk::{partition, ChunkLimit};

    fn unit_with(source: KeyMap) -> TranslationUnit {
        TranslationUnit::new("examplemod", source, None)
    }

    #[test]
    fn single_part_request_states_rules_and_omits_part_line() {
        let source: KeyMap = [("item.gem", "\u{00A7}aGem of %s {0}")].into_iter().collect();
        let unit = unit_with(source.clone());
        let chunks = partition(&source, ChunkLimit::default());
        let text = RequestFormatter::new("Russian").format(&chunks[0], &unit);

        assert!(text.starts_with("Translate the values of the JSON object below into Russian."));
        assert!(text.contains("Do NOT translate, rename, add or remove keys"));
        assert!(text.contains("byte for byte"));
        assert!(text.contains("Reply with ONLY the translated JSON object"));
        assert!(text.contains("Resource: examplemod"));
        assert!(!text.contains("part 1 of"));
        assert!(text.ends_with(&source.to_pretty_json()));
    }

    #[test]
    fn multipart_request_states_ordinal_and_total() {
        let source: KeyMap = (0..5).map(|i| (format!("k{i}"), format!("v{i}"))).collect();
        let unit = unit_with(source.clone());
        let chunks = partition(&source, ChunkLimit::Keys(2));
        let formatter = RequestFormatter::new("German");
        let texts: Vec<String> = chunks.iter().map(|c| formatter.format(c, &unit)).collect();
        assert!(texts[0].contains("This is part 1 of 3."));
        assert!(texts[2].contains("This is part 3 of 3."));
    }

    #[test]
    fn render_template_is_single_pass() {
        let out = render_template(
            "{{a}} and {{b}} and {{unknown}}",
            &[("a", "{{b}}"), ("b", "B")],
        );
        assert_eq!(out, "{{b}} and B and {{unknown}}");
    }

    #[test]
    fn custom_template_requires_block() {
        assert!(RequestFormatter::with_template("no placeholder", "French").is_err());
        let f = RequestFormatter::with_template(
            "[{{target_name}}]\n{{part_line}}{{rules}}\n{{block}}",
            "French",
        )
        .expect("template");
        let source: KeyMap = [("a", "b")].into_iter().collect();
        let chunks = partition(&source, ChunkLimit::default());
        assert_eq!(
            f.format(&chunks[0], &unit_with(source)),
            format!("[French]\n{REQUEST_RULES}\n{{\n  \"a\": \"b\"\n}}")
        );
    }

    #[test]
    fn custom_template_without_rules_or_part_line_still_gets_them() {
        let f = RequestFormatter::with_template("Translate:\n{{block}}", "German").expect("template");
        let source: KeyMap = (0..4).map(|i| (format!("k{i}"), format!("v{i}"))).collect();
        let unit = unit_with(source.clone());
        let chunks = partition(&source, ChunkLimit::Keys(2));

        let first = f.format(&chunks[0], &unit);
        assert!(first.starts_with("This is part 1 of 2."));
        assert!(first.contains(REQUEST_RULES));
        assert!(first.ends_with("Translate:\n{\n  \"k0\": \"v0\",\n  \"k1\": \"v1\"\n}"));

        let single = partition(&source, ChunkLimit::default());
        let text = f.format(&single[0], &unit);
        assert!(text.starts_with(REQUEST_RULES));
        assert!(!text.contains("part 1 of"));
    }
}
