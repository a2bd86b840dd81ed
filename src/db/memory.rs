//! In-memory template store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::{StoreError, TemplateStore};
use crate::template::models::Template;

#[derive(Default)]
pub struct MemoryTemplateStore {
    records: RwLock<HashMap<Uuid, Template>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn insert(&self, template: &Template) -> Result<(), StoreError> {
        self.records.write().insert(template.id, template.clone());
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Template>, StoreError> {
        let mut all: Vec<Template> = self.records.read().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Template>, StoreError> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, StoreError> {
        Ok(self.records.write().remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::models::TemplateKind;
    use chrono::Duration;

    #[tokio::test]
    async fn test_crud_round() {
        let store = MemoryTemplateStore::new();
        let template = Template::new("Invoice".into(), TemplateKind::Docx, "a.docx".into());

        store.insert(&template).await.unwrap();
        assert_eq!(
            store.find_by_id(&template.id).await.unwrap().unwrap().path,
            "a.docx"
        );
        assert!(store.delete(&template.id).await.unwrap());
        assert!(store.find_by_id(&template.id).await.unwrap().is_none());
        assert!(!store.delete(&template.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_all_newest_first() {
        let store = MemoryTemplateStore::new();
        let mut older = Template::new("Old".into(), TemplateKind::Excel, "old.xlsx".into());
        older.created_at = older.created_at - Duration::hours(1);
        let newer = Template::new("New".into(), TemplateKind::Docx, "new.docx".into());
        store.insert(&older).await.unwrap();
        store.insert(&newer).await.unwrap();

        let names: Vec<String> = store
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["New".to_string(), "Old".to_string()]);
    }
}
