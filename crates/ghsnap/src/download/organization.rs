use super::{DownloadError, DownloadProgress, Downloader, OrganizationStats, Result};
use crate::github::types::Organization;
use crate::source::ConnectionKind;
use crate::store::MetadataStore;

impl<S: MetadataStore> Downloader<S> {
    pub(super) async fn walk_organization(
        &self,
        login: &str,
        stats: &mut OrganizationStats,
    ) -> Result<()> {
        let Organization {
            fields,
            members_with_role,
        } = self
            .source
            .organization(login, &self.sizes)
            .await
            .map_err(|e| DownloadError::fetch(format!("organization {login}"), e))?;

        self.store
            .save_organization(&fields)
            .await
            .map_err(|e| DownloadError::store(format!("organization {}", fields.login), e))?;

        // Member pages are addressed by login rather than node id.
        let mut member_pages = self.walker(
            &fields.login,
            ConnectionKind::OrganizationMembers,
            members_with_role,
        );
        while let Some(page) = self.next_page(&mut member_pages).await? {
            for member in page {
                self.store.save_user(&member).await.map_err(|e| {
                    DownloadError::store(
                        format!("member {} of {}", member.login, fields.login),
                        e,
                    )
                })?;
                stats.members += 1;
                self.emit(DownloadProgress::MemberSaved {
                    login: member.login,
                });
            }
        }
        stats.pages_fetched += member_pages.fetches();

        Ok(())
    }
}
