//! Parameterised query templates.
//!
//! A template file is a JSON array of records:
//!
//! ```json
//! [{
//!   "gid": "1",
//!   "groups": {"en": "Relations"},
//!   "texts": {"en": "Which substances cure {0}?"},
//!   "cypher": "MATCH (s)-[:CURES]->(d {{lemma: \"{0}\"}}) RETURN s",
//!   "input": [{"id": "0", "type": "entity"}],
//!   "output": ["s"]
//! }]
//! ```
//!
//! `{0}`, `{1}`, … (or `{}` for the next position) are replaced with
//! `<prefix><input.id><suffix>` markers that the caller later substitutes
//! with user values; `{{` and `}}` are literal braces.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInput {
    pub id: String,
    /// `entity`, `entity_type`, `relation`, or `relation_detail`.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTemplate {
    pub gid: String,
    #[serde(default)]
    pub groups: IndexMap<String, String>,
    #[serde(default)]
    pub texts: IndexMap<String, String>,
    pub cypher: String,
    #[serde(default)]
    pub input: Vec<TemplateInput>,
    #[serde(default)]
    pub output: Vec<String>,
}

/// A template with its placeholders filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedTemplate {
    pub gid: String,
    pub groups: IndexMap<String, String>,
    pub texts: IndexMap<String, String>,
    pub cypher: String,
    pub input: Vec<TemplateInput>,
    pub output: Vec<String>,
}

impl QueryTemplate {
    /// Fill placeholders with `<prefix><id><suffix>` markers.
    pub fn render(&self, prefix: &str, suffix: &str) -> Result<RenderedTemplate, TemplateError> {
        self.render_with(prefix, suffix, false)
    }

    /// Like [`render`](Self::render), but texts show each marker with its
    /// input type: `(<prefix><id><suffix>:<type>)`.
    pub fn render_annotated(
        &self,
        prefix: &str,
        suffix: &str,
    ) -> Result<RenderedTemplate, TemplateError> {
        self.render_with(prefix, suffix, true)
    }

    fn render_with(
        &self,
        prefix: &str,
        suffix: &str,
        annotated: bool,
    ) -> Result<RenderedTemplate, TemplateError> {
        let markers: Vec<String> = self
            .input
            .iter()
            .map(|i| format!("{prefix}{}{suffix}", i.id))
            .collect();
        let text_markers: Vec<String> = if annotated {
            self.input
                .iter()
                .zip(&markers)
                .map(|(i, m)| format!("({m}:{})", i.kind))
                .collect()
        } else {
            markers.clone()
        };

        let texts = self
            .texts
            .iter()
            .map(|(lang, text)| {
                self.substitute(text, &text_markers)
                    .map(|rendered| (lang.clone(), rendered))
            })
            .collect::<Result<IndexMap<_, _>, TemplateError>>()?;

        Ok(RenderedTemplate {
            gid: self.gid.clone(),
            groups: self.groups.clone(),
            texts,
            cypher: self.substitute(&self.cypher, &markers)?,
            input: self.input.clone(),
            output: self.output.clone(),
        })
    }

    fn substitute(&self, text: &str, args: &[String]) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(text.len());
        let mut next_auto = 0;
        let mut chars = text.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut field = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        field.push(n);
                    }
                    if !closed {
                        return Err(self.malformed(position));
                    }
                    let index = if field.is_empty() {
                        next_auto += 1;
                        next_auto - 1
                    } else {
                        field.parse::<usize>().map_err(|_| self.malformed(position))?
                    };
                    let value = args.get(index).ok_or_else(|| TemplateError::MissingInput {
                        gid: self.gid.clone(),
                        index,
                        available: args.len(),
                    })?;
                    out.push_str(value);
                }
                '}' => return Err(self.malformed(position)),
                other => out.push(other),
            }
        }
        Ok(out)
    }

    fn malformed(&self, position: usize) -> TemplateError {
        TemplateError::Malformed {
            gid: self.gid.clone(),
            position,
        }
    }
}

/// Parse a JSON array of templates.
pub fn parse_templates(json: &str) -> Result<Vec<QueryTemplate>, TemplateError> {
    Ok(serde_json::from_str(json)?)
}

/// Load templates from a JSON file.
pub fn load_templates(path: impl AsRef<Path>) -> Result<Vec<QueryTemplate>, TemplateError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let templates = parse_templates(&content)?;
    tracing::debug!(path = %path.as_ref().display(), count = templates.len(), "Loaded query templates");
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATES: &str = r#"[
      {
        "gid": "1",
        "groups": {"en": "Relations"},
        "texts": {"en": "Who {1} {0}?", "sa": "{0} {1} kaH?"},
        "cypher": "MATCH (a)-[r:{1}]->(b {{lemma: \"{0}\"}}) RETURN a",
        "input": [{"id": "0", "type": "entity"}, {"id": "1", "type": "relation"}],
        "output": ["a"]
      },
      {
        "gid": "2",
        "texts": {"en": "All {}"},
        "cypher": "MATCH (n:{}) RETURN n",
        "input": [{"id": "label", "type": "entity_type"}]
      }
    ]"#;

    #[test]
    fn test_render_positional_placeholders() {
        let templates = parse_templates(TEMPLATES).unwrap();
        let rendered = templates[0].render("__", "__").unwrap();

        assert_eq!(rendered.texts["en"], "Who __1__ __0__?");
        assert_eq!(rendered.texts["sa"], "__0__ __1__ kaH?");
        assert_eq!(
            rendered.cypher,
            r#"MATCH (a)-[r:__1__]->(b {lemma: "__0__"}) RETURN a"#
        );
        assert_eq!(rendered.output, vec!["a"]);
    }

    #[test]
    fn test_render_auto_numbered_and_defaults() {
        let templates = parse_templates(TEMPLATES).unwrap();
        let rendered = templates[1].render("{", "}").unwrap();

        assert_eq!(rendered.cypher, "MATCH (n:{label}) RETURN n");
        assert!(rendered.groups.is_empty());
        assert!(rendered.output.is_empty());
    }

    #[test]
    fn test_render_annotated_texts_only() {
        let templates = parse_templates(TEMPLATES).unwrap();
        let rendered = templates[1].render_annotated("__", "__").unwrap();

        assert_eq!(rendered.texts["en"], "All (__label__:entity_type)");
        assert_eq!(rendered.cypher, "MATCH (n:__label__) RETURN n");
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let template = QueryTemplate {
            gid: "x".to_string(),
            groups: IndexMap::new(),
            texts: IndexMap::new(),
            cypher: "MATCH (n) WHERE n.x = {3} RETURN n".to_string(),
            input: Vec::new(),
            output: Vec::new(),
        };
        assert!(matches!(
            template.render("", ""),
            Err(TemplateError::MissingInput { index: 3, available: 0, .. })
        ));
    }

    #[test]
    fn test_unbalanced_brace_is_malformed() {
        let mut templates = parse_templates(TEMPLATES).unwrap();
        templates[1].cypher = "MATCH (n) RETURN n}".to_string();
        assert!(matches!(
            templates[1].render("", ""),
            Err(TemplateError::Malformed { position: 18, .. })
        ));
    }

    #[test]
    fn test_load_templates_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.json");
        std::fs::write(&path, TEMPLATES).unwrap();

        let templates = load_templates(&path).unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].input[1].kind, "relation");

        assert!(matches!(
            load_templates(dir.path().join("missing.json")),
            Err(TemplateError::Io(_))
        ));
    }
}
