//! Pricing and fee calculation.
//!
//! Pure and deterministic: the same inputs always produce the same snapshot,
//! and no I/O happens here. All arithmetic is integer minor units; the fee
//! percentage arrives as basis points from configuration.

use crate::domain::Error;
use crate::domain::money::{Currency, Money};

/// Urgency multiplier applied to the base quote, in basis points.
///
/// `10_000` is 1.0×. Categories may define their own multipliers; the
/// standard ones are provided as constants.
pub const URGENCY_STANDARD_BPS: u32 = 10_000;
/// Same-day callout premium (1.25×).
pub const URGENCY_SAME_DAY_BPS: u32 = 12_500;
/// Emergency callout premium (1.5×).
pub const URGENCY_EMERGENCY_BPS: u32 = 15_000;

/// Category tariff captured at quote time.
#[derive(Debug, Clone)]
pub struct CategoryRate {
    /// Flat callout charge.
    pub base_rate: Money,
    /// Charge per started kilometre of travel.
    pub per_km_rate: Money,
    /// Minimum quote for the category.
    pub floor: Money,
}

/// Inputs to [`compute_quote`].
#[derive(Debug, Clone)]
pub struct QuoteInput {
    pub rate: CategoryRate,
    pub distance_km: f64,
    /// Urgency multiplier in basis points; `10_000` means no premium.
    pub urgency_bps: u32,
    /// Opaque promo discount in basis points, already resolved upstream.
    pub promo_discount_bps: u32,
}

/// Pricing knobs from configuration.
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    /// Platform fee share in basis points (15% → 1_500).
    pub platform_fee_bps: u32,
    /// Bookings farther than this from the servicer pool are rejected.
    pub max_service_radius_km: f64,
    pub currency: Currency,
}

/// Pricing snapshot fields produced by the calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub quoted_amount: Money,
    pub platform_fee: Money,
    pub servicer_earning: Money,
}

/// Compute the quote, platform fee, and servicer earning.
///
/// The platform fee uses banker's rounding; the servicer earning is the
/// exact remainder so `fee + earning == quoted` always holds.
///
/// # Errors
/// Returns a validation error tagged `invalid_quote` when the distance
/// exceeds the service radius.
///
/// # Examples
/// ```
/// use backend::domain::pricing::{compute_quote, CategoryRate, PricingPolicy, QuoteInput};
/// use backend::domain::pricing::URGENCY_STANDARD_BPS;
/// use backend::domain::{Currency, Money};
///
/// let quote = compute_quote(
///     &QuoteInput {
///         rate: CategoryRate {
///             base_rate: Money::from_minor(100_000),
///             per_km_rate: Money::ZERO,
///             floor: Money::from_minor(20_000),
///         },
///         distance_km: 3.0,
///         urgency_bps: URGENCY_STANDARD_BPS,
///         promo_discount_bps: 0,
///     },
///     &PricingPolicy {
///         platform_fee_bps: 1_500,
///         max_service_radius_km: 50.0,
///         currency: Currency::new("inr"),
///     },
/// )
/// .expect("within radius");
/// assert_eq!(quote.platform_fee, Money::from_minor(15_000));
/// assert_eq!(quote.servicer_earning, Money::from_minor(85_000));
/// ```
pub fn compute_quote(input: &QuoteInput, policy: &PricingPolicy) -> Result<Quote, Error> {
    if !input.distance_km.is_finite() || input.distance_km < 0.0 {
        return Err(Error::validation("distance must be a non-negative number"));
    }
    if input.distance_km > policy.max_service_radius_km {
        return Err(Error::validation(format!(
            "distance {:.1} km exceeds the {:.1} km service radius",
            input.distance_km, policy.max_service_radius_km
        ))
        .with_details(serde_json::json!({ "code": "invalid_quote" })));
    }

    // Charge travel per started kilometre so the tariff stays integral.
    #[allow(clippy::cast_possible_truncation)]
    let started_km = input.distance_km.ceil() as i64;
    let travel = Money::from_minor(input.rate.per_km_rate.minor() * started_km);
    let base = input.rate.base_rate + travel;

    let with_urgency = base.split_basis_points(input.urgency_bps);
    let discount = with_urgency.split_basis_points(input.promo_discount_bps);
    let mut quoted = with_urgency - discount;
    if quoted < input.rate.floor {
        quoted = input.rate.floor;
    }

    let platform_fee = quoted.split_basis_points(policy.platform_fee_bps);
    Ok(Quote {
        quoted_amount: quoted,
        platform_fee,
        servicer_earning: quoted - platform_fee,
    })
}
