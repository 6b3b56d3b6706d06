use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{QuizError, Result};

/// A question as sent to clients. Carries no answer information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKey {
    pub question_id: String,
    pub correct_option_index: usize,
}

/// Immutable snapshot of one catalog load.
#[derive(Debug, Default)]
pub struct Catalog {
    questions: Vec<Question>,
    keys: HashMap<String, usize>,
}

impl Catalog {
    /// Builds a snapshot, requiring exactly one in-range key per question.
    /// Keys that reference no question are dropped.
    pub fn new(questions: Vec<Question>, answer_keys: Vec<AnswerKey>) -> Result<Self> {
        let mut keys = HashMap::with_capacity(answer_keys.len());
        for key in answer_keys {
            if keys.insert(key.question_id.clone(), key.correct_option_index).is_some() {
                return Err(QuizError::invalid_catalog(format!(
                    "duplicate answer key for question {}",
                    key.question_id
                )));
            }
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id.as_str()) {
                return Err(QuizError::invalid_catalog(format!(
                    "duplicate question id {}",
                    question.id
                )));
            }
            match keys.get(&question.id) {
                Some(&index) if index < question.options.len() => {}
                Some(&index) => {
                    return Err(QuizError::invalid_catalog(format!(
                        "answer index {} out of range for question {}",
                        index, question.id
                    )))
                }
                None => {
                    return Err(QuizError::invalid_catalog(format!(
                        "missing answer key for question {}",
                        question.id
                    )))
                }
            }
        }

        let orphaned = keys.len() - questions.len();
        if orphaned > 0 {
            tracing::warn!(orphaned, "Dropping answer keys without a matching question");
            keys.retain(|id, _| seen.contains(id.as_str()));
        }

        Ok(Self { questions, keys })
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Text of the correct option, resolved through the answer key.
    pub(crate) fn correct_option(&self, question_id: &str) -> Option<&str> {
        let question = self.question(question_id)?;
        let index = *self.keys.get(question_id)?;
        question.options.get(index).map(String::as_str)
    }
}

/// Process-wide holder of the current catalog. Reloads swap the whole
/// snapshot; readers keep whatever `Arc` they already cloned.
pub struct CatalogStore {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Catalog::default())),
        }
    }

    pub async fn snapshot(&self) -> Arc<Catalog> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, catalog: Catalog) -> Arc<Catalog> {
        let catalog = Arc::new(catalog);
        *self.current.write().await = catalog.clone();
        catalog
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of questions and their answer keys.
#[async_trait]
pub trait QuestionLoader: Send + Sync {
    async fn load(&self) -> Result<(Vec<Question>, Vec<AnswerKey>)>;
}

/// Stored question record: the answer index lives next to the question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: usize,
}

fn split_records(records: Vec<QuestionRecord>) -> (Vec<Question>, Vec<AnswerKey>) {
    records
        .into_iter()
        .map(|record| {
            let key = AnswerKey {
                question_id: record.id.clone(),
                correct_option_index: record.answer,
            };
            let question = Question {
                id: record.id,
                prompt: record.prompt,
                options: record.options,
            };
            (question, key)
        })
        .unzip()
}

/// Loads a JSON array of [`QuestionRecord`]s from disk on every call.
pub struct JsonFileLoader {
    path: PathBuf,
}

impl JsonFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QuestionLoader for JsonFileLoader {
    async fn load(&self) -> Result<(Vec<Question>, Vec<AnswerKey>)> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            QuizError::catalog_load(format!("{}: {}", self.path.display(), e))
        })?;
        let records: Vec<QuestionRecord> = serde_json::from_slice(&raw).map_err(|e| {
            QuizError::catalog_load(format!("{}: {}", self.path.display(), e))
        })?;

        tracing::debug!(path = %self.path.display(), count = records.len(), "Read question file");
        Ok(split_records(records))
    }
}

/// Serves a fixed set of records.
pub struct StaticLoader {
    records: Vec<QuestionRecord>,
}

impl StaticLoader {
    pub fn new(records: Vec<QuestionRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl QuestionLoader for StaticLoader {
    async fn load(&self) -> Result<(Vec<Question>, Vec<AnswerKey>)> {
        Ok(split_records(self.records.clone()))
    }
}

#[cfg(test)]
pub(crate) fn record(id: &str, options: &[&str], answer: usize) -> QuestionRecord {
    QuestionRecord {
        id: id.to_string(),
        prompt: format!("Prompt for {id}"),
        options: options.iter().map(|o| o.to_string()).collect(),
        answer,
    }
}
