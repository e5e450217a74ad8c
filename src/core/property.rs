//! Property business logic - listing, lookup and capacity accounting.
//!
//! Capacity counters (`available_to_invest`, `total_invested`, `investor_count`) only move
//! through [`reserve_capacity`], which guards the update with the row's `revision`.

use crate::{
    core::concurrency::conflict,
    entities::{Property, property},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use std::fmt;
use tracing::{debug, info, instrument};

/// Listing status of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyStatus {
    /// Accepting investments
    Active,
    /// Temporarily closed to new money
    Inactive,
    /// Fully closed
    Closed,
}

impl PropertyStatus {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Closed => "closed",
        }
    }

    /// Parses the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for listing a property.
#[derive(Debug, Clone)]
pub struct NewProperty {
    /// Display name
    pub name: String,
    /// Smallest accepted ticket
    pub min_investment: Decimal,
    /// Lock-in applied to new holdings
    pub lock_in_months: i32,
    /// Monthly return as a percentage
    pub monthly_return_rate: Decimal,
    /// Total capacity open to investors
    pub capacity: Decimal,
}

/// Lists a new active property.
///
/// # Errors
/// Returns `Error::Validation` for an empty name, a negative lock-in or rate, or a minimum
/// ticket that exceeds the capacity.
#[instrument(skip(db, new), fields(name = %new.name))]
pub async fn create_property(db: &DatabaseConnection, new: NewProperty) -> Result<property::Model> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::validation("property name cannot be empty"));
    }
    if new.lock_in_months < 0 {
        return Err(Error::validation("lock-in cannot be negative"));
    }
    if new.monthly_return_rate < Decimal::ZERO {
        return Err(Error::validation("monthly return rate cannot be negative"));
    }
    if new.min_investment <= Decimal::ZERO {
        return Err(Error::InvalidAmount {
            amount: new.min_investment,
        });
    }
    if new.capacity < new.min_investment {
        return Err(Error::validation(
            "capacity must be at least the minimum investment",
        ));
    }

    let listing = property::ActiveModel {
        name: Set(name.to_string()),
        min_investment: Set(new.min_investment),
        lock_in_months: Set(new.lock_in_months),
        monthly_return_rate: Set(new.monthly_return_rate),
        available_to_invest: Set(new.capacity),
        total_invested: Set(Decimal::ZERO),
        investor_count: Set(0),
        status: Set(PropertyStatus::Active.as_str().to_string()),
        revision: Set(0),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let model = listing.insert(db).await?;
    info!(property_id = model.id, "Listed property");
    Ok(model)
}

/// Finds a property by id.
pub async fn get_property<C>(db: &C, property_id: i64) -> Result<Option<property::Model>>
where
    C: ConnectionTrait,
{
    Property::find_by_id(property_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an active property by its exact name.
pub async fn get_property_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<property::Model>> {
    Property::find()
        .filter(property::Column::Name.eq(name))
        .filter(property::Column::Status.eq(PropertyStatus::Active.as_str()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All properties accepting investments, ordered by name.
pub async fn get_all_active_properties(db: &DatabaseConnection) -> Result<Vec<property::Model>> {
    Property::find()
        .filter(property::Column::Status.eq(PropertyStatus::Active.as_str()))
        .order_by_asc(property::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Changes a property's listing status. Existing holdings are unaffected.
pub async fn set_property_status(
    db: &DatabaseConnection,
    property_id: i64,
    status: PropertyStatus,
) -> Result<property::Model> {
    let existing = get_property(db, property_id)
        .await?
        .ok_or_else(|| Error::not_found("property", property_id))?;

    let mut active: property::ActiveModel = existing.into();
    active.status = Set(status.as_str().to_string());
    active.update(db).await.map_err(Into::into)
}

/// Checks that `property` can take a new investment of `amount` without changing anything.
///
/// # Errors
/// - `Error::InvalidAmount` if `amount` is not positive
/// - `Error::PropertyUnavailable` if the property is not active or lacks capacity
/// - `Error::BelowMinimum` if `amount` is below the minimum ticket
pub fn check_investable(property: &property::Model, amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    if property.status != PropertyStatus::Active.as_str() {
        return Err(Error::PropertyUnavailable {
            property_id: property.id,
            reason: format!("property is {}", property.status),
        });
    }
    if amount < property.min_investment {
        return Err(Error::BelowMinimum {
            amount,
            minimum: property.min_investment,
        });
    }
    if property.available_to_invest < amount {
        return Err(Error::PropertyUnavailable {
            property_id: property.id,
            reason: format!(
                "only {} left to invest",
                property.available_to_invest.normalize()
            ),
        });
    }
    Ok(())
}

/// Validates and reserves `amount` of the property's capacity for a new holding.
///
/// Moves `amount` from `available_to_invest` to `total_invested` and counts one more
/// investor, guarded by the revision read here.
pub(crate) async fn reserve_capacity<C>(
    db: &C,
    property_id: i64,
    amount: Decimal,
) -> Result<property::Model>
where
    C: ConnectionTrait,
{
    let current = get_property(db, property_id)
        .await?
        .ok_or_else(|| Error::PropertyUnavailable {
            property_id,
            reason: "property does not exist".to_string(),
        })?;
    check_investable(&current, amount)?;
    write_reservation(db, &current, amount).await
}

/// Moves `amount` into `total_invested`, only if the row's revision still matches `current`.
async fn write_reservation<C>(
    db: &C,
    current: &property::Model,
    amount: Decimal,
) -> Result<property::Model>
where
    C: ConnectionTrait,
{
    let available = current.available_to_invest - amount;
    let invested = current.total_invested + amount;
    let revision = current.revision + 1;

    let result = Property::update_many()
        .col_expr(property::Column::AvailableToInvest, Expr::value(available))
        .col_expr(property::Column::TotalInvested, Expr::value(invested))
        .col_expr(
            property::Column::InvestorCount,
            Expr::col(property::Column::InvestorCount).add(1),
        )
        .col_expr(property::Column::Revision, Expr::value(revision))
        .filter(property::Column::Id.eq(current.id))
        .filter(property::Column::Revision.eq(current.revision))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(conflict(format!("property {}", current.id)));
    }

    debug!(property_id = current.id, %amount, revision, "Reserved property capacity");

    Ok(property::Model {
        available_to_invest: available,
        total_invested: invested,
        investor_count: current.investor_count + 1,
        revision,
        ..current.clone()
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_create_property() -> Result<()> {
        let db = setup_test_db().await?;
        let property = create_test_property(&db, "Harbour View").await?;

        assert_eq!(property.name, "Harbour View");
        assert_eq!(property.status, "active");
        assert_eq!(property.total_invested, dec!(0));
        assert_eq!(property.investor_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_property_rejects_bad_input() -> Result<()> {
        let db = setup_test_db().await?;
        let result = create_property(
            &db,
            NewProperty {
                name: "   ".to_string(),
                min_investment: dec!(100),
                lock_in_months: 3,
                monthly_return_rate: dec!(0.5),
                capacity: dec!(1000),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_property(
            &db,
            NewProperty {
                name: "Tiny".to_string(),
                min_investment: dec!(1000),
                lock_in_months: 3,
                monthly_return_rate: dec!(0.5),
                capacity: dec!(500),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_check_investable() -> Result<()> {
        let db = setup_test_db().await?;
        let property = create_test_property(&db, "Harbour View").await?;

        assert!(check_investable(&property, dec!(500000)).is_ok());
        assert!(matches!(
            check_investable(&property, dec!(0)),
            Err(Error::InvalidAmount { .. })
        ));
        assert!(matches!(
            check_investable(&property, dec!(99999)),
            Err(Error::BelowMinimum { .. })
        ));
        assert!(matches!(
            check_investable(&property, dec!(20000000)),
            Err(Error::PropertyUnavailable { .. })
        ));

        let closed = set_property_status(&db, property.id, PropertyStatus::Closed).await?;
        assert!(matches!(
            check_investable(&closed, dec!(500000)),
            Err(Error::PropertyUnavailable { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_capacity_conserves_total() -> Result<()> {
        let db = setup_test_db().await?;
        let property = create_test_property(&db, "Harbour View").await?;
        let before = property.available_to_invest + property.total_invested;

        let updated = reserve_capacity(&db, property.id, dec!(500000)).await?;
        assert_eq!(updated.total_invested, dec!(500000));
        assert_eq!(updated.investor_count, 1);
        assert_eq!(updated.revision, 1);

        let stored = get_property(&db, property.id).await?.unwrap();
        assert_eq!(stored.revision, updated.revision);
        assert_eq!(stored.investor_count, 1);
        assert_eq!(stored.available_to_invest + stored.total_invested, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_active_listing_and_lookup_by_name() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_property(&db, "Beta Tower").await?;
        create_test_property(&db, "Alpha Court").await?;
        set_property_status(&db, a.id, PropertyStatus::Inactive).await?;

        let active = get_all_active_properties(&db).await?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Alpha Court");

        assert!(get_property_by_name(&db, "Beta Tower").await?.is_none());
        assert!(get_property_by_name(&db, "Alpha Court").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_revision_is_a_conflict() -> Result<()> {
        let db = setup_test_db().await?;
        let stale = create_test_property(&db, "Harbour View").await?;
        reserve_capacity(&db, stale.id, dec!(200000)).await?;

        let result = write_reservation(&db, &stale, dec!(300000)).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        let stored = get_property(&db, stale.id).await?.unwrap();
        assert_eq!(stored.total_invested, dec!(200000));
        assert_eq!(stored.investor_count, 1);
        assert_eq!(stored.revision, stale.revision + 1);
        Ok(())
    }
}
