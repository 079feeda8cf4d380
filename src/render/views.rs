//! Templates taking part in one render, with their dictionaries
//!
//! Every template rendered in a session (the root and each include) gets an
//! entry in an arena. Entries point at the template that included them, which
//! gives dictionaries somewhere to bubble to.

use crate::compiler::CompiledTemplate;
use crate::i18n::Dictionary;
use std::sync::Arc;

pub(crate) struct View {
    pub template: Arc<CompiledTemplate>,
    pub parent: Option<usize>,
    /// Attached dictionaries, in attachment order
    dictionaries: Vec<(Option<String>, Arc<Dictionary>)>,
}

/// Outcome of a translation lookup
#[derive(Debug, PartialEq)]
pub(crate) enum Lookup {
    Found(String),
    /// Dictionaries were searched but none had the key
    MissingEntry,
    /// No dictionary of that name is attached anywhere up the chain
    MissingDictionary,
}

#[derive(Default)]
pub(crate) struct Views {
    views: Vec<View>,
}

impl Views {
    pub fn push(&mut self, template: Arc<CompiledTemplate>, parent: Option<usize>) -> usize {
        self.views.push(View {
            template,
            parent,
            dictionaries: Vec::new(),
        });
        self.views.len() - 1
    }

    pub fn template(&self, view: usize) -> Arc<CompiledTemplate> {
        Arc::clone(&self.views[view].template)
    }

    /// Template path of a view; detached evaluations have none
    pub fn path(&self, view: usize) -> &str {
        self.views
            .get(view)
            .map(|v| v.template.path.as_str())
            .unwrap_or("<expression>")
    }

    /// `view` followed by each of its ancestors
    fn chain(&self, view: usize) -> impl Iterator<Item = &View> {
        std::iter::successors(Some(&self.views[view]), move |v| {
            v.parent.map(|parent| &self.views[parent])
        })
    }

    /// Anonymous dictionaries stay on `view`. Named ones go to the topmost
    /// ancestor that lacks that name, or replace the one on `view`.
    pub fn attach(&mut self, view: usize, name: Option<&str>, dictionary: Arc<Dictionary>) {
        match name {
            None => self.views[view].dictionaries.push((None, dictionary)),
            Some(name) => {
                self.attach_named(view, name, dictionary, true);
            }
        }
    }

    fn attach_named(&mut self, view: usize, name: &str, dictionary: Arc<Dictionary>, origin: bool) -> bool {
        if let Some(parent) = self.views[view].parent {
            if self.attach_named(parent, name, Arc::clone(&dictionary), false) {
                return true;
            }
        }
        let dictionaries = &mut self.views[view].dictionaries;
        match dictionaries
            .iter_mut()
            .find(|(n, _)| n.as_deref() == Some(name))
        {
            Some(slot) if origin => {
                slot.1 = dictionary;
                true
            }
            Some(_) => false,
            None => {
                dictionaries.push((Some(name.to_string()), dictionary));
                true
            }
        }
    }

    pub fn translate(&self, view: usize, key: &str, name: Option<&str>) -> Lookup {
        let mut seen = false;
        for current in self.chain(view) {
            for (dict_name, dictionary) in &current.dictionaries {
                if name.is_some() && dict_name.as_deref() != name {
                    continue;
                }
                seen = true;
                if let Some(value) = dictionary.get(key) {
                    return Lookup::Found(value.to_string());
                }
            }
        }
        if name.is_some() && !seen {
            Lookup::MissingDictionary
        } else {
            Lookup::MissingEntry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_str;

    fn template(path: &str) -> Arc<CompiledTemplate> {
        Arc::new(compile_str("<a/>", path, "fig:").unwrap())
    }

    fn dictionary(entries: &[(&str, &str)]) -> Arc<Dictionary> {
        let mut dictionary = Dictionary::new("d.xml", "fr");
        for (key, value) in entries {
            dictionary.insert(key, value);
        }
        Arc::new(dictionary)
    }

    #[test]
    fn test_named_dictionary_bubbles_to_root() {
        let mut views = Views::default();
        let root = views.push(template("root.xml"), None);
        let child = views.push(template("child.xml"), Some(root));
        views.attach(child, Some("main"), dictionary(&[("k", "root")]));

        let sibling = views.push(template("other.xml"), Some(root));
        assert_eq!(views.translate(sibling, "k", Some("main")), Lookup::Found("root".into()));

        // The root already has "main": the second one lands on the child.
        views.attach(child, Some("main"), dictionary(&[("k", "child")]));
        assert_eq!(views.translate(child, "k", Some("main")), Lookup::Found("child".into()));
        assert_eq!(views.translate(sibling, "k", Some("main")), Lookup::Found("root".into()));
    }

    #[test]
    fn test_anonymous_dictionaries_stay_local() {
        let mut views = Views::default();
        let root = views.push(template("root.xml"), None);
        let child = views.push(template("child.xml"), Some(root));
        views.attach(child, None, dictionary(&[("k", "v")]));

        assert_eq!(views.translate(child, "k", None), Lookup::Found("v".into()));
        assert_eq!(views.translate(root, "k", None), Lookup::MissingEntry);
    }

    #[test]
    fn test_missing_named_dictionary() {
        let mut views = Views::default();
        let root = views.push(template("root.xml"), None);
        views.attach(root, None, dictionary(&[("k", "v")]));
        assert_eq!(views.translate(root, "k", Some("nope")), Lookup::MissingDictionary);
        assert_eq!(views.translate(root, "x", None), Lookup::MissingEntry);
    }
}
