//! RDFa extraction
//!
//! Covers the RDFa Lite attribute set (`vocab`, `prefix`, `typeof`,
//! `property`, `resource`) plus `about`, `href`, `src`, `content` and
//! `datetime`. Output is one expanded JSON-LD node per subject:
//!
//! ```json
//! {"@id": "_:b0", "@type": ["http://schema.org/Recipe"],
//!  "http://schema.org/name": [{"@value": "Pie"}]}
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use scraper::{ElementRef, Html};
use serde_json::{json, Value};
use url::Url;

use super::opengraph_extractor::parse_prefix_attr;
use super::Record;

/// RDFa initial context prefixes (subset)
const INITIAL_PREFIXES: &[(&str, &str)] = &[
    ("og", "http://ogp.me/ns#"),
    ("article", "http://ogp.me/ns/article#"),
    ("fb", "http://ogp.me/ns/fb#"),
    ("schema", "http://schema.org/"),
    ("dc", "http://purl.org/dc/terms/"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

#[derive(Debug, Clone)]
struct Context {
    vocab: Option<String>,
    prefixes: HashMap<String, String>,
    subject: String,
}

impl Context {
    fn expand(&self, term: &str) -> Option<String> {
        if let Some((prefix, reference)) = term.split_once(':') {
            if let Some(namespace) = self.prefixes.get(&prefix.to_ascii_lowercase()) {
                return Some(format!("{}{}", namespace, reference));
            }
            // Absolute IRI, CURIE with an unknown prefix, or blank node
            return Some(term.to_string());
        }
        self.vocab.as_ref().map(|vocab| format!("{}{}", vocab, term))
    }

    fn expand_all(&self, attr: Option<&str>) -> Vec<String> {
        attr.map(|a| a.split_whitespace().filter_map(|t| self.expand(t)).collect())
            .unwrap_or_default()
    }
}

/// Subjects in first-seen order
#[derive(Debug, Default)]
struct Graph {
    nodes: Vec<Record>,
    index: HashMap<String, usize>,
    blank_nodes: usize,
}

impl Graph {
    fn node(&mut self, id: &str) -> &mut Record {
        let idx = match self.index.get(id) {
            Some(&idx) => idx,
            None => {
                let mut node = Record::new();
                node.insert("@id".to_string(), Value::String(id.to_string()));
                self.nodes.push(node);
                self.index.insert(id.to_string(), self.nodes.len() - 1);
                self.nodes.len() - 1
            }
        };
        &mut self.nodes[idx]
    }

    fn next_blank(&mut self) -> String {
        let id = format!("_:b{}", self.blank_nodes);
        self.blank_nodes += 1;
        id
    }

    fn push(&mut self, subject: &str, key: &str, value: Value) {
        let node = self.node(subject);
        match node.get_mut(key) {
            Some(Value::Array(values)) => values.push(value),
            _ => {
                node.insert(key.to_string(), Value::Array(vec![value]));
            }
        }
    }

    fn into_records(self) -> Vec<Record> {
        // A bare "@id" carries no statements
        self.nodes.into_iter().filter(|node| node.len() > 1).collect()
    }
}

/// Extract RDFa statements grouped by subject
pub fn extract_rdfa(document: &Html, base_url: &Url) -> Vec<Record> {
    let context = Rc::new(Context {
        vocab: None,
        prefixes: INITIAL_PREFIXES
            .iter()
            .map(|(p, ns)| (p.to_string(), ns.to_string()))
            .collect(),
        subject: base_url.to_string(),
    });

    let mut graph = Graph::default();
    // Elements still to visit, each with the context of its parent
    let mut pending = vec![(document.root_element(), context)];

    while let Some((element, parent)) = pending.pop() {
        let context = visit(element, &parent, base_url, &mut graph);
        pending.extend(
            element
                .children()
                .rev()
                .filter_map(ElementRef::wrap)
                .map(|child| (child, Rc::clone(&context))),
        );
    }

    graph.into_records()
}

/// Record the statements on one element and return the context its children
/// inherit. The parent context is shared unless this element changes it.
fn visit(element: ElementRef, parent: &Rc<Context>, base_url: &Url, graph: &mut Graph) -> Rc<Context> {
    let el = element.value();

    let mut context = Rc::clone(parent);
    if let Some(vocab) = el.attr("vocab") {
        let vocab = vocab.trim();
        Rc::make_mut(&mut context).vocab = (!vocab.is_empty()).then(|| vocab.to_string());
    }
    if let Some(declared) = el.attr("prefix") {
        Rc::make_mut(&mut context).prefixes.extend(parse_prefix_attr(declared));
    }

    let properties = context.expand_all(el.attr("property"));
    let types = context.expand_all(el.attr("typeof"));
    let about = el.attr("about").map(|a| resolve(base_url, a));
    let resource = el
        .attr("resource")
        .or_else(|| el.attr("href"))
        .or_else(|| el.attr("src"))
        .map(|r| resolve(base_url, r));

    if el.attr("typeof").is_some() {
        let subject = about
            .clone()
            .or_else(|| resource.clone())
            .unwrap_or_else(|| graph.next_blank());

        for iri in &types {
            graph.push(&subject, "@type", Value::String(iri.clone()));
        }
        // Typed element carrying a property links the enclosing subject to it
        for iri in &properties {
            graph.push(&parent.subject, iri, json!({ "@id": &subject }));
        }
        Rc::make_mut(&mut context).subject = subject;
    } else {
        if let Some(about) = about {
            Rc::make_mut(&mut context).subject = about;
        }
        if !properties.is_empty() {
            let value = literal_or_reference(&element, resource);
            for iri in &properties {
                graph.push(&context.subject, iri, value.clone());
            }
        }
    }

    context
}

fn literal_or_reference(element: &ElementRef, resource: Option<String>) -> Value {
    let el = element.value();
    if let Some(content) = el.attr("content") {
        return json!({ "@value": content });
    }
    if let Some(iri) = resource {
        return json!({ "@id": iri });
    }
    if let Some(datetime) = el.attr("datetime") {
        return json!({ "@value": datetime });
    }
    let text: String = element.text().collect();
    json!({ "@value": text.trim() })
}

fn resolve(base_url: &Url, reference: &str) -> String {
    let reference = reference.trim();
    if reference.starts_with("_:") {
        return reference.to_string();
    }
    base_url
        .join(reference)
        .map(String::from)
        .unwrap_or_else(|_| reference.to_string())
}
