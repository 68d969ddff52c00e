//! In-memory content repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{Poll, Question, QuestionBank, QuestionSet, Survey};
use crate::parser::ContentBundle;
use crate::traits::QuestionRepository;

/// Content held in memory, indexed by id. Later duplicates win.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    questions: HashMap<String, Arc<Question>>,
    question_sets: HashMap<String, Arc<QuestionSet>>,
    question_banks: HashMap<String, Arc<QuestionBank>>,
    polls: HashMap<String, Arc<Poll>>,
    surveys: HashMap<String, Arc<Survey>>,
}

impl InMemoryRepository {
    pub fn new(bundle: ContentBundle) -> Self {
        fn index<T>(items: Vec<T>, id: impl Fn(&T) -> String) -> HashMap<String, Arc<T>> {
            items.into_iter().map(|item| (id(&item), Arc::new(item))).collect()
        }

        Self {
            questions: index(bundle.questions, |q| q.id.clone()),
            question_sets: index(bundle.question_sets, |s| s.id.clone()),
            question_banks: index(bundle.question_banks, |b| b.id().to_string()),
            polls: index(bundle.polls, |p| p.id.clone()),
            surveys: index(bundle.surveys, |s| s.id.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
            + self.question_sets.len()
            + self.question_banks.len()
            + self.polls.len()
            + self.surveys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<ContentBundle> for InMemoryRepository {
    fn from(bundle: ContentBundle) -> Self {
        Self::new(bundle)
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn question(&self, id: &str) -> anyhow::Result<Option<Arc<Question>>> {
        Ok(self.questions.get(id).cloned())
    }

    async fn question_set(&self, id: &str) -> anyhow::Result<Option<Arc<QuestionSet>>> {
        Ok(self.question_sets.get(id).cloned())
    }

    async fn question_bank(&self, id: &str) -> anyhow::Result<Option<Arc<QuestionBank>>> {
        Ok(self.question_banks.get(id).cloned())
    }

    async fn poll(&self, id: &str) -> anyhow::Result<Option<Arc<Poll>>> {
        Ok(self.polls.get(id).cloned())
    }

    async fn survey(&self, id: &str) -> anyhow::Result<Option<Arc<Survey>>> {
        Ok(self.surveys.get(id).cloned())
    }
}
