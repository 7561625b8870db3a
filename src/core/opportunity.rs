//! Opportunity business logic - publishing and listing volunteering opportunities.

use crate::{
    context::RequestContext,
    core::organization::{get_organization, require_admin},
    entities::{Opportunity, opportunity},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Page size of the opportunity listing
pub const OPPORTUNITIES_PER_PAGE: u64 = 20;

/// Payload for publishing an opportunity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOpportunity {
    /// Owning organization
    pub organization_id: i64,
    /// Listing title
    pub title: String,
    /// Long-form description
    pub description: String,
    /// Listing category
    pub category: String,
    /// Comma-separated skills
    pub skills: String,
    /// First day, if bounded
    pub start_date: Option<NaiveDate>,
    /// Last day, if bounded
    pub end_date: Option<NaiveDate>,
    /// Free-text location
    pub location: String,
}

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Items across all pages
    pub total: u64,
    /// 1-based page number
    pub page: u64,
    /// Page size
    pub per_page: u64,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` items
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.per_page)
    }
}

/// Publishes an opportunity for an organization the caller administers.
#[instrument(skip(db, new), fields(organization_id = new.organization_id))]
pub async fn create_opportunity(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    new: NewOpportunity,
) -> Result<opportunity::Model> {
    if new.title.trim().is_empty() {
        return Err(Error::Validation {
            message: "Opportunity title cannot be empty".to_string(),
        });
    }
    if let (Some(start), Some(end)) = (new.start_date, new.end_date) {
        if end < start {
            return Err(Error::Validation {
                message: format!("Opportunity ends ({end}) before it starts ({start})"),
            });
        }
    }

    let txn = db.begin().await?;
    get_organization(&txn, ctx.tenant_id, new.organization_id).await?;
    require_admin(&txn, ctx, new.organization_id, "publish opportunities").await?;

    let created = opportunity::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        organization_id: Set(new.organization_id),
        title: Set(new.title.trim().to_string()),
        description: Set(new.description),
        category: Set(new.category),
        skills: Set(new.skills),
        start_date: Set(new.start_date),
        end_date: Set(new.end_date),
        location: Set(new.location),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(opportunity_id = created.id, "Opportunity published");
    Ok(created)
}

/// Finds an opportunity by id within the tenant.
pub async fn get_opportunity<C>(
    db: &C,
    tenant_id: i64,
    opportunity_id: i64,
) -> Result<opportunity::Model>
where
    C: ConnectionTrait,
{
    Opportunity::find_by_id(opportunity_id)
        .filter(opportunity::Column::TenantId.eq(tenant_id))
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "opportunity",
            id: opportunity_id,
        })
}

/// Lists the tenant's opportunities, newest first, 20 per page.
///
/// `page` is 1-based; page 0 is treated as page 1.
pub async fn list_opportunities(
    db: &DatabaseConnection,
    tenant_id: i64,
    page: u64,
) -> Result<Page<opportunity::Model>> {
    let page = page.max(1);
    let paginator = Opportunity::find()
        .filter(opportunity::Column::TenantId.eq(tenant_id))
        .order_by_desc(opportunity::Column::CreatedAt)
        .order_by_desc(opportunity::Column::Id)
        .paginate(db, OPPORTUNITIES_PER_PAGE);

    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(Page {
        items,
        total,
        page,
        per_page: OPPORTUNITIES_PER_PAGE,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_opportunity_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_opportunity(
            &db,
            &test_ctx(ADMIN),
            NewOpportunity {
                organization_id: 1,
                title: "  ".to_string(),
                ..NewOpportunity::default()
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = create_opportunity(
            &db,
            &test_ctx(ADMIN),
            NewOpportunity {
                organization_id: 1,
                title: "Beach clean".to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 6, 10),
                end_date: NaiveDate::from_ymd_opt(2024, 6, 1),
                ..NewOpportunity::default()
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_opportunity_requires_admin() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;

        let result = create_opportunity(
            &db,
            &test_ctx(VOLUNTEER),
            NewOpportunity {
                organization_id: org.id,
                title: "Reading buddies".to_string(),
                ..NewOpportunity::default()
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Forbidden { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_and_get_opportunity() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;
        let opp = create_test_opportunity(&db, org.id, "Park cleanup").await?;

        assert_eq!(opp.organization_id, org.id);
        assert_eq!(opp.tenant_id, TENANT);
        assert_eq!(get_opportunity(&db, TENANT, opp.id).await?, opp);

        let result = get_opportunity(&db, OTHER_TENANT, opp.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_list_opportunities_paginates_by_twenty() -> Result<()> {
        let db = setup_test_db().await?;
        let org = create_test_organization(&db, true).await?;
        for i in 0..25 {
            create_test_opportunity(&db, org.id, &format!("Opportunity {i}")).await?;
        }

        let first = list_opportunities(&db, TENANT, 1).await?;
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.total, 25);
        assert_eq!(first.total_pages(), 2);
        assert_eq!(first.items[0].title, "Opportunity 24");

        let second = list_opportunities(&db, TENANT, 2).await?;
        assert_eq!(second.items.len(), 5);
        assert_eq!(second.items[4].title, "Opportunity 0");

        // Page 0 is clamped to the first page
        let clamped = list_opportunities(&db, TENANT, 0).await?;
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.items, first.items);

        let other = list_opportunities(&db, OTHER_TENANT, 1).await?;
        assert!(other.items.is_empty());
        assert_eq!(other.total, 0);

        Ok(())
    }
}
