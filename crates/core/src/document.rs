//! Raw how-to documents and the sources that serve them by id.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{CorpusError, Result};

/// One step of a how-to article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Name of the method this step belongs to.
    pub section: String,
    pub summary: String,
    pub text: String,
}

/// A how-to article as it appears in the raw corpus.
///
/// Steps keep the key order of the source JSON object; the flattener relies
/// on it to number steps within a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub title: String,
    pub steps: IndexMap<String, StepInfo>,
}

impl RawDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            steps: IndexMap::new(),
        }
    }

    /// Append a step under the next free numeric key.
    pub fn with_step(
        mut self,
        section: impl Into<String>,
        summary: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let key = self.steps.len().to_string();
        self.steps.insert(
            key,
            StepInfo {
                section: section.into(),
                summary: summary.into(),
                text: text.into(),
            },
        );
        self
    }

    /// Group steps by method name.
    ///
    /// Methods come out in order of first appearance and steps keep their
    /// original relative order inside each method.
    pub fn methods(&self) -> IndexMap<&str, Vec<&StepInfo>> {
        let mut method2steps: IndexMap<&str, Vec<&StepInfo>> = IndexMap::new();
        for step in self.steps.values() {
            method2steps.entry(step.section.as_str()).or_default().push(step);
        }
        method2steps
    }
}

/// Anything that can hand out raw documents by integer id.
pub trait DocumentSource {
    /// Fetch the document with the given id, or `None` past the end.
    fn document(&self, id: usize) -> Option<Cow<'_, RawDocument>>;

    /// Number of documents available.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: DocumentSource + ?Sized> DocumentSource for &S {
    fn document(&self, id: usize) -> Option<Cow<'_, RawDocument>> {
        (*self).document(id)
    }

    fn len(&self) -> usize {
        (*self).len()
    }
}

/// An in-memory corpus.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<RawDocument>,
}

impl Corpus {
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self { documents }
    }

    /// Load a corpus from a JSONL file, or from every `*.jsonl` file under a
    /// directory (sorted by path, concatenated in that order).
    pub fn from_path(path: &Path) -> Result<Self> {
        let files = if path.is_dir() {
            discover_jsonl_files(path)
        } else {
            vec![path.to_path_buf()]
        };

        let mut documents = Vec::new();
        for file in &files {
            documents.extend(load_jsonl(file)?);
        }
        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[RawDocument] {
        &self.documents
    }
}

impl DocumentSource for Corpus {
    fn document(&self, id: usize) -> Option<Cow<'_, RawDocument>> {
        self.documents.get(id).map(Cow::Borrowed)
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

impl From<Vec<RawDocument>> for Corpus {
    fn from(documents: Vec<RawDocument>) -> Self {
        Self::new(documents)
    }
}

/// Discover all JSONL files in a directory.
pub fn discover_jsonl_files(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "jsonl"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

/// Read one document per non-blank line.
pub fn load_jsonl(path: &Path) -> Result<Vec<RawDocument>> {
    let reader = BufReader::new(File::open(path)?);
    let mut documents = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: RawDocument = serde_json::from_str(&line).map_err(|source| CorpusError::Json {
            path: path.to_path_buf(),
            line: line_no + 1,
            source,
        })?;
        documents.push(doc);
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_methods_preserve_order() {
        let doc = RawDocument::new("Make Tea")
            .with_step("Boil Water", "Fill the kettle.", "Use cold water.")
            .with_step("Steep", "Add the bag.", "One bag per cup.")
            .with_step("Boil Water", "Switch it on.", "Wait for the click.");

        let methods = doc.methods();
        let names: Vec<&str> = methods.keys().copied().collect();
        assert_eq!(names, vec!["Boil Water", "Steep"]);
        assert_eq!(methods["Boil Water"][0].summary, "Fill the kettle.");
        assert_eq!(methods["Boil Water"][1].summary, "Switch it on.");
    }

    #[test]
    fn test_load_jsonl_keeps_step_key_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("docs.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{"title": "Fold a Shirt", "steps": {{"b": {{"section": "Flat", "summary": "Lay it down.", "text": "Smooth it."}}, "a": {{"section": "Flat", "summary": "Fold the sleeves.", "text": "Tuck them."}}}}}}"#
        )
        .unwrap();
        writeln!(file).unwrap();

        let docs = load_jsonl(&path).unwrap();
        assert_eq!(docs.len(), 1);
        let keys: Vec<&str> = docs[0].steps.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_load_jsonl_reports_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.jsonl");
        std::fs::write(&path, "{\"title\": \"ok\", \"steps\": {}}\nnot json\n").unwrap();

        match load_jsonl(&path) {
            Err(CorpusError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected json error, got {:?}", other),
        }
    }

    #[test]
    fn test_corpus_from_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("shard")).unwrap();
        std::fs::write(
            temp.path().join("a.jsonl"),
            "{\"title\": \"First\", \"steps\": {}}\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("shard/b.jsonl"),
            "{\"title\": \"Second\", \"steps\": {}}\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let corpus = Corpus::from_path(temp.path()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.document(0).unwrap().title, "First");
        assert_eq!(corpus.document(1).unwrap().title, "Second");
        assert!(corpus.document(2).is_none());
    }
}
