//! Validator: applies a generator-emitted patch to a scratch document and
//! reports structured failure (spec §4.5/§6.2).
//!
//! The real DOM/HTML patch applier is an external collaborator (spec §1); the
//! scratch document here is a minimal id-indexed model sufficient to decide
//! whether a patch set is well-formed before it's allowed downstream.

use std::collections::HashMap;

use crate::error::{PatchValidationError, PatchValidationReason};
use crate::model::Patch;

#[derive(Debug, Clone, Default)]
struct Node {
    inner_html: String,
    attributes: HashMap<String, String>,
}

/// An in-memory stand-in for the document the generator is mutating.
/// Indexed by element id (the part of an id-based CSS selector after `#`).
#[derive(Debug, Clone, Default)]
pub struct ScratchDocument {
    nodes: HashMap<String, Node>,
}

impl ScratchDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the document with a known element, e.g. reconstructed from the
    /// session's last `Full`/`Done` row on restart.
    pub fn seed(&mut self, id: &str, inner_html: impl Into<String>) {
        self.nodes.insert(
            id.to_string(),
            Node {
                inner_html: inner_html.into(),
                attributes: HashMap::new(),
            },
        );
    }

    fn element_id(selector: &str) -> Result<&str, PatchValidationReason> {
        let id = selector
            .strip_prefix('#')
            .ok_or(PatchValidationReason::ApplyFailure)?;
        if id.is_empty() {
            return Err(PatchValidationReason::EmptySelector);
        }
        Ok(id)
    }

    fn apply_one(&mut self, patch: &Patch) -> Result<(), PatchValidationError> {
        let selector = patch.selector().to_string();
        let id = Self::element_id(&selector).map_err(|reason| PatchValidationError {
            selector: selector.clone(),
            reason,
            message: "selector is not an id-based CSS fragment".to_string(),
        })?;

        if matches!(patch, Patch::Remove { .. }) {
            if self.nodes.remove(id).is_none() {
                return Err(PatchValidationError {
                    selector,
                    reason: PatchValidationReason::SelectorNotFound,
                    message: format!("no element with id '{id}' to remove"),
                });
            }
            return Ok(());
        }

        let node = self.nodes.get_mut(id).ok_or_else(|| PatchValidationError {
            selector: selector.clone(),
            reason: PatchValidationReason::SelectorNotFound,
            message: format!("no element with id '{id}'"),
        })?;

        match patch {
            Patch::SetText { text, .. } => node.inner_html = text.clone(),
            Patch::SetInnerHtml { html, .. } => node.inner_html = html.clone(),
            Patch::AppendHtml { html, .. } => node.inner_html.push_str(html),
            Patch::PrependHtml { html, .. } => {
                node.inner_html = format!("{html}{}", node.inner_html);
            }
            Patch::SetAttributes { attr, .. } => {
                for (key, value) in attr {
                    match value {
                        Some(v) => {
                            node.attributes.insert(key.clone(), v.clone());
                        }
                        None => {
                            node.attributes.remove(key);
                        }
                    }
                }
            }
            Patch::Remove { .. } => unreachable!("handled above"),
        }
        Ok(())
    }

    /// Validate and apply every patch in `patches`. Either all patches are
    /// applied (document mutated in place, in order) or none are.
    pub fn apply_all(&mut self, patches: &[Patch]) -> Result<(), PatchValidationError> {
        let mut trial = self.clone();
        for patch in patches {
            trial.apply_one(patch)?;
        }
        *self = trial;
        Ok(())
    }

    pub fn inner_html(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(|n| n.inner_html.as_str())
    }

    pub fn attribute(&self, id: &str, key: &str) -> Option<&str> {
        self.nodes.get(id)?.attributes.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn set_text_on_known_id_succeeds() {
        let mut doc = ScratchDocument::new();
        doc.seed("root", "");
        doc.apply_all(&[Patch::SetText {
            selector: "#root".into(),
            text: "hello".into(),
        }])
        .unwrap();
        assert_eq!(doc.inner_html("root"), Some("hello"));
    }

    #[test]
    fn unknown_selector_is_selector_not_found() {
        let mut doc = ScratchDocument::new();
        let err = doc
            .apply_all(&[Patch::SetText {
                selector: "#does-not-exist".into(),
                text: "x".into(),
            }])
            .unwrap_err();
        assert_eq!(err.reason, PatchValidationReason::SelectorNotFound);
    }

    #[test]
    fn empty_id_selector_is_empty_selector() {
        let mut doc = ScratchDocument::new();
        let err = doc
            .apply_all(&[Patch::SetText {
                selector: "#".into(),
                text: "x".into(),
            }])
            .unwrap_err();
        assert_eq!(err.reason, PatchValidationReason::EmptySelector);
    }

    #[test]
    fn non_id_selector_is_apply_failure() {
        let mut doc = ScratchDocument::new();
        let err = doc
            .apply_all(&[Patch::SetText {
                selector: ".not-an-id".into(),
                text: "x".into(),
            }])
            .unwrap_err();
        assert_eq!(err.reason, PatchValidationReason::ApplyFailure);
    }

    #[test]
    fn partial_failure_leaves_document_unmutated() {
        let mut doc = ScratchDocument::new();
        doc.seed("a", "original");

        let err = doc
            .apply_all(&[
                Patch::SetText {
                    selector: "#a".into(),
                    text: "changed".into(),
                },
                Patch::SetText {
                    selector: "#missing".into(),
                    text: "y".into(),
                },
            ])
            .unwrap_err();

        assert_eq!(err.reason, PatchValidationReason::SelectorNotFound);
        assert_eq!(doc.inner_html("a"), Some("original"));
    }

    #[test]
    fn set_attributes_null_removes_attribute() {
        let mut doc = ScratchDocument::new();
        doc.seed("a", "");
        let mut attr = StdHashMap::new();
        attr.insert("class".to_string(), Some("foo".to_string()));
        doc.apply_all(&[Patch::SetAttributes {
            selector: "#a".into(),
            attr,
        }])
        .unwrap();
        assert_eq!(doc.attribute("a", "class"), Some("foo"));

        let mut remove_attr = StdHashMap::new();
        remove_attr.insert("class".to_string(), None);
        doc.apply_all(&[Patch::SetAttributes {
            selector: "#a".into(),
            attr: remove_attr,
        }])
        .unwrap();
        assert_eq!(doc.attribute("a", "class"), None);
    }

    #[test]
    fn remove_deletes_node() {
        let mut doc = ScratchDocument::new();
        doc.seed("a", "x");
        doc.apply_all(&[Patch::Remove {
            selector: "#a".into(),
        }])
        .unwrap();
        assert_eq!(doc.inner_html("a"), None);
    }

    #[test]
    fn append_and_prepend_html() {
        let mut doc = ScratchDocument::new();
        doc.seed("a", "mid");
        doc.apply_all(&[
            Patch::PrependHtml {
                selector: "#a".into(),
                html: "pre-".into(),
            },
            Patch::AppendHtml {
                selector: "#a".into(),
                html: "-post".into(),
            },
        ])
        .unwrap();
        assert_eq!(doc.inner_html("a"), Some("pre-mid-post"));
    }
}
