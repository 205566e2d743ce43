use crate::{Corpus, Document};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Load a product corpus from a `.json`/`.jsonl` file or a directory of them.
///
/// A `.json` file may hold an array of documents, a single document, or an
/// object keyed by pid. Later duplicates replace earlier ones.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Corpus> {
    let path = path.as_ref();
    let mut files: Vec<PathBuf> = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(extension(p), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        anyhow::bail!("corpus path {} does not exist", path.display());
    }

    let mut corpus = Corpus::new();
    for file in &files {
        let docs = match extension(file) {
            Some("jsonl") => read_jsonl(file),
            _ => read_json(file),
        };
        let docs = docs.with_context(|| format!("reading corpus file {}", file.display()))?;
        for doc in docs {
            insert(&mut corpus, doc);
        }
    }
    tracing::info!(path = %path.display(), files = files.len(), documents = corpus.len(), "corpus loaded");
    Ok(corpus)
}

/// Parse a corpus held in memory as JSON (same shapes as a `.json` file).
pub fn corpus_from_json_str(json: &str) -> Result<Corpus> {
    let value: Value = serde_json::from_str(json)?;
    let mut corpus = Corpus::new();
    for doc in documents_from_value(value)? {
        insert(&mut corpus, doc);
    }
    Ok(corpus)
}

fn extension(p: &Path) -> Option<&str> {
    p.extension().and_then(|s| s.to_str())
}

fn insert(corpus: &mut Corpus, doc: Document) {
    if let Some(old) = corpus.insert(doc.pid.clone(), doc) {
        tracing::warn!(pid = %old.pid, "duplicate pid in corpus, keeping the last one");
    }
}

fn read_jsonl(file: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: Document = serde_json::from_str(&line).with_context(|| format!("line {}", lineno + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(file)?);
    let json: Value = serde_json::from_reader(reader)?;
    documents_from_value(json)
}

fn documents_from_value(json: Value) -> Result<Vec<Document>> {
    match json {
        Value::Array(arr) => arr.into_iter().map(|v| serde_json::from_value(v).map_err(anyhow::Error::from)).collect(),
        Value::Object(obj) if obj.contains_key("pid") => Ok(vec![serde_json::from_value(Value::Object(obj))?]),
        Value::Object(obj) => obj
            .into_iter()
            .map(|(key, mut v)| {
                if let Value::Object(fields) = &mut v {
                    fields.entry("pid").or_insert_with(|| Value::String(key.clone()));
                }
                serde_json::from_value(v).with_context(|| format!("document {key}"))
            })
            .collect(),
        _ => anyhow::bail!("expected a JSON array or object of documents"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_array_keyed_object_and_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"pid":"1","title":"one"},{"pid":"2","title":"two"}]"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"3":{"title":"three"}}"#).unwrap();
        fs::write(dir.path().join("c.jsonl"), "{\"pid\":\"4\",\"title\":\"four\"}\n\n{\"pid\":\"1\",\"title\":\"uno\"}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let corpus = load_corpus(dir.path()).unwrap();
        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus["3"].pid, "3");
        // c.jsonl is read after a.json, so its copy of pid 1 wins
        assert_eq!(corpus["1"].title, "uno");
    }

    #[test]
    fn single_object_document() {
        let corpus = corpus_from_json_str(r#"{"pid":"x","title":"solo"}"#).unwrap();
        assert_eq!(corpus["x"].title, "solo");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"pid\":\"1\"}\nnot json\n").unwrap();
        let err = load_corpus(&path).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn missing_path_is_an_error() {
        assert!(load_corpus("/definitely/not/here.json").is_err());
    }
}
