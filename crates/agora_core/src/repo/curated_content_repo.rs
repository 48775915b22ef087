//! Editorially curated community lists.

use crate::model::community::{Community, CuratedContent};
use crate::model::Entity;
use crate::query::traced;
use crate::repo::community_repo::CommunityRepository;
use crate::repo::{decode_opt, RepoResult};
use crate::store::{DocumentStore, Filter};

pub struct CuratedContentRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> CuratedContentRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    /// Communities listed under `kind`; empty when the list does not exist.
    pub fn communities(&self, kind: &str) -> RepoResult<Vec<Community>> {
        traced("curated_communities", (kind,), || {
            let list: Option<CuratedContent> = decode_opt(
                self.store
                    .find_one(CuratedContent::COLLECTION, &Filter::eq("type", kind))?,
            )?;
            match list {
                Some(list) => CommunityRepository::new(self.store).by_slugs(&list.data),
                None => Ok(Vec::new()),
            }
        })
    }
}
