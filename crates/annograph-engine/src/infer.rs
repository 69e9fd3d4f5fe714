//! Strategies for synthesizing edge endpoints that are not yet in the graph.

use std::collections::HashMap;

use annograph_core::config::{InferenceConfig, InferenceRule};
use annograph_core::{NodeId, PropertyMap};

/// Property set on every synthesized endpoint.
pub const AUTO_PROPERTY: &str = "auto";

/// Labels and properties for the two endpoints of an edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inference {
    pub start_labels: Vec<String>,
    pub end_labels: Vec<String>,
    pub start_properties: PropertyMap,
    pub end_properties: PropertyMap,
}

/// Supplies labels/properties for endpoints referenced by an edge before
/// the node itself was added. Only the missing endpoint's half is used.
pub trait InferStrategy {
    fn infer(&self, start: &NodeId, label: &str, end: &NodeId, properties: &PropertyMap)
        -> Inference;
}

impl<F> InferStrategy for F
where
    F: Fn(&NodeId, &str, &NodeId, &PropertyMap) -> Inference,
{
    fn infer(
        &self,
        start: &NodeId,
        label: &str,
        end: &NodeId,
        properties: &PropertyMap,
    ) -> Inference {
        self(start, label, end, properties)
    }
}

/// No labels; both endpoints marked `auto=true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInference;

impl InferStrategy for DefaultInference {
    fn infer(&self, _: &NodeId, _: &str, _: &NodeId, _: &PropertyMap) -> Inference {
        let auto = PropertyMap::new().with(AUTO_PROPERTY, true);
        Inference {
            start_labels: Vec::new(),
            end_labels: Vec::new(),
            start_properties: auto.clone(),
            end_properties: auto,
        }
    }
}

/// Label rules keyed by relation, plus provenance copied from the edge.
///
/// A synthesized endpoint gets, in order: `lemma` from the lexicon (when
/// known), every `carry` key present on the edge, and `auto=true`.
#[derive(Debug, Clone, Default)]
pub struct RuleInference {
    rules: HashMap<String, InferenceRule>,
    carry: Vec<String>,
    lexicon: HashMap<NodeId, String>,
}

impl RuleInference {
    pub fn new(rules: impl IntoIterator<Item = InferenceRule>, carry: Vec<String>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| (rule.relation.clone(), rule))
                .collect(),
            carry,
            lexicon: HashMap::new(),
        }
    }

    pub fn from_config(config: &InferenceConfig) -> Self {
        Self::new(config.rules.iter().cloned(), config.carry.clone())
    }

    /// Lemma lookup for node ids, supplied by the corpus layer.
    pub fn with_lexicon(mut self, lexicon: HashMap<NodeId, String>) -> Self {
        self.lexicon = lexicon;
        self
    }

    fn endpoint_properties(&self, id: &NodeId, edge_properties: &PropertyMap) -> PropertyMap {
        let mut props = PropertyMap::new();
        if let Some(lemma) = self.lexicon.get(id) {
            props.insert("lemma", lemma.clone());
        }
        for key in &self.carry {
            if let Some(value) = edge_properties.get(key) {
                props.insert_property(key.clone(), value.clone());
            }
        }
        props.insert(AUTO_PROPERTY, true);
        props
    }
}

impl InferStrategy for RuleInference {
    fn infer(
        &self,
        start: &NodeId,
        label: &str,
        end: &NodeId,
        properties: &PropertyMap,
    ) -> Inference {
        let (start_labels, end_labels) = match self.rules.get(label) {
            Some(rule) => (rule.source.clone(), rule.target.clone()),
            None => (Vec::new(), Vec::new()),
        };
        Inference {
            start_labels,
            end_labels,
            start_properties: self.endpoint_properties(start, properties),
            end_properties: self.endpoint_properties(end, properties),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyGraph;
    use annograph_core::PropertyValue;

    fn rules() -> RuleInference {
        RuleInference::new(
            vec![
                InferenceRule {
                    relation: "IS_QUALITY_OF".to_string(),
                    source: vec!["QUALITY".to_string()],
                    target: Vec::new(),
                },
                InferenceRule {
                    relation: "HAPPENS_AFTER".to_string(),
                    source: vec!["EVENT".to_string()],
                    target: vec!["EVENT".to_string()],
                },
            ],
            vec!["annotator".to_string(), "line_id".to_string()],
        )
    }

    #[test]
    fn test_default_inference_marks_auto() {
        let inferred = DefaultInference.infer(
            &NodeId::Int(1),
            "REL",
            &NodeId::Int(2),
            &PropertyMap::new(),
        );
        assert!(inferred.start_labels.is_empty());
        assert_eq!(
            inferred.end_properties.get_value(AUTO_PROPERTY),
            Some(&PropertyValue::Boolean(true))
        );
    }

    #[test]
    fn test_rule_inference_labels_and_provenance() {
        let strategy = rules().with_lexicon(HashMap::from([(NodeId::Int(2), "yuddha".to_string())]));
        let edge_props = PropertyMap::new()
            .with("annotator", 3)
            .with("line_id", 41)
            .with("detail", "ignored");

        let inferred = strategy.infer(&NodeId::Int(1), "HAPPENS_AFTER", &NodeId::Int(2), &edge_props);

        assert_eq!(inferred.start_labels, vec!["EVENT"]);
        assert_eq!(inferred.end_labels, vec!["EVENT"]);
        assert!(!inferred.start_properties.contains_key("lemma"));
        assert!(!inferred.start_properties.contains_key("detail"));
        assert_eq!(
            inferred.end_properties.keys().cloned().collect::<Vec<_>>(),
            vec!["lemma", "annotator", "line_id", "auto"]
        );
    }

    #[test]
    fn test_rule_inference_unknown_relation_has_no_labels() {
        let inferred = rules().infer(&NodeId::Int(1), "RELATED_TO", &NodeId::Int(2), &PropertyMap::new());
        assert!(inferred.start_labels.is_empty());
        assert!(inferred.end_labels.is_empty());
    }

    #[test]
    fn test_graph_uses_injected_strategy() {
        let mut graph = PropertyGraph::with_inference(rules());
        graph.add_node(1, ["EVENT"], PropertyMap::new().with("lemma", "vadha"));
        graph.add_edge(1, "HAPPENS_AFTER", 2, PropertyMap::new().with("line_id", 9));

        let synthesized = graph.node(&NodeId::Int(2)).unwrap();
        assert_eq!(synthesized.labels(), &["EVENT".to_string()]);
        assert_eq!(
            synthesized.properties().get_value("line_id"),
            Some(&PropertyValue::Integer(9))
        );
        // The existing start node is not touched by inference.
        assert_eq!(graph.node(&NodeId::Int(1)).unwrap().properties().len(), 1);
    }

    #[test]
    fn test_closure_as_strategy() {
        let mut graph = PropertyGraph::with_inference(
            |_: &NodeId, label: &str, _: &NodeId, _: &PropertyMap| Inference {
                end_labels: vec![format!("{label}_TARGET")],
                ..Inference::default()
            },
        );
        graph.add_edge("a", "CAUSES", "b", PropertyMap::new());

        let end = graph.node(&NodeId::from("b")).unwrap();
        assert_eq!(end.labels(), &["CAUSES_TARGET".to_string()]);
        assert!(end.properties().is_empty());
    }
}
