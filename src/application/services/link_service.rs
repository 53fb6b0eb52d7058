//! Link Service
//!
//! Curated external links shown grouped by category.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::domain::{Link, LinkRepository};
use crate::shared::snowflake::SnowflakeGenerator;

/// Link service trait
#[async_trait]
pub trait LinkService: Send + Sync {
    /// Active links grouped by category, categories in first-seen order
    async fn grouped(&self) -> Result<Vec<LinkCategoryDto>, LinkError>;

    /// Every link including inactive ones
    async fn admin_list(&self) -> Result<Vec<Link>, LinkError>;

    async fn create(&self, request: LinkInputDto) -> Result<Link, LinkError>;

    async fn update(&self, id: i64, request: LinkInputDto) -> Result<Link, LinkError>;

    async fn delete(&self, id: i64) -> Result<(), LinkError>;
}

/// Links of one category
#[derive(Debug, Clone, Serialize)]
pub struct LinkCategoryDto {
    pub category: String,
    pub links: Vec<Link>,
}

/// Create / update link request
#[derive(Debug, Clone)]
pub struct LinkInputDto {
    pub title: String,
    pub url: String,
    pub category: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
}

/// Link service errors
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Link not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Group links by category, keeping the order links arrive in.
pub fn group_by_category(links: Vec<Link>) -> Vec<LinkCategoryDto> {
    let mut groups: Vec<LinkCategoryDto> = Vec::new();
    for link in links {
        match groups.iter_mut().find(|g| g.category == link.category) {
            Some(group) => group.links.push(link),
            None => groups.push(LinkCategoryDto {
                category: link.category.clone(),
                links: vec![link],
            }),
        }
    }
    groups
}

/// LinkService implementation
pub struct LinkServiceImpl<L>
where
    L: LinkRepository,
{
    link_repo: Arc<L>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<L> LinkServiceImpl<L>
where
    L: LinkRepository,
{
    pub fn new(link_repo: Arc<L>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            link_repo,
            id_generator,
        }
    }
}

#[async_trait]
impl<L> LinkService for LinkServiceImpl<L>
where
    L: LinkRepository + 'static,
{
    async fn grouped(&self) -> Result<Vec<LinkCategoryDto>, LinkError> {
        let links = self
            .link_repo
            .list(true)
            .await
            .map_err(|e| LinkError::Internal(e.to_string()))?;
        Ok(group_by_category(links))
    }

    async fn admin_list(&self) -> Result<Vec<Link>, LinkError> {
        self.link_repo
            .list(false)
            .await
            .map_err(|e| LinkError::Internal(e.to_string()))
    }

    async fn create(&self, request: LinkInputDto) -> Result<Link, LinkError> {
        let link = Link {
            id: self.id_generator.generate(),
            title: request.title,
            url: request.url,
            category: request.category,
            description: request.description,
            sort_order: request.sort_order,
            is_active: request.is_active,
            created_at: Utc::now(),
        };

        self.link_repo
            .create(&link)
            .await
            .map_err(|e| LinkError::Internal(e.to_string()))
    }

    async fn update(&self, id: i64, request: LinkInputDto) -> Result<Link, LinkError> {
        let mut link = self
            .link_repo
            .find_by_id(id)
            .await
            .map_err(|e| LinkError::Internal(e.to_string()))?
            .ok_or(LinkError::NotFound)?;

        link.title = request.title;
        link.url = request.url;
        link.category = request.category;
        link.description = request.description;
        link.sort_order = request.sort_order;
        link.is_active = request.is_active;

        self.link_repo
            .update(&link)
            .await
            .map_err(|e| LinkError::Internal(e.to_string()))
    }

    async fn delete(&self, id: i64) -> Result<(), LinkError> {
        let deleted = self
            .link_repo
            .delete(id)
            .await
            .map_err(|e| LinkError::Internal(e.to_string()))?;
        if !deleted {
            return Err(LinkError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn link(id: i64, category: &str) -> Link {
        Link {
            id,
            title: format!("Link {}", id),
            url: format!("https://example.com/{}", id),
            category: category.into(),
            description: None,
            sort_order: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_grouping_keeps_order() {
        let groups = group_by_category(vec![
            link(1, "Tools"),
            link(2, "Reading"),
            link(3, "Tools"),
        ]);

        let summary: Vec<(String, Vec<i64>)> = groups
            .iter()
            .map(|g| (g.category.clone(), g.links.iter().map(|l| l.id).collect()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Tools".to_string(), vec![1, 3]),
                ("Reading".to_string(), vec![2]),
            ]
        );
    }
}
