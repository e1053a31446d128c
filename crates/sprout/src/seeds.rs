//! Seed shop selection.

use std::cmp::Reverse;

use crate::catalog::SeedRecommendation;
use crate::proto::shop::COND_LEVEL;
use crate::proto::GoodsInfo;

/// A seed the player can buy right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOffer {
    pub goods_id: i64,
    pub seed_id: i64,
    pub price: i64,
    pub required_level: i64,
}

/// Why a seed was picked. Logged with the purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedChoice {
    ForcedLowest,
    Recommended,
    RecommendedLevel,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPolicy {
    pub force_lowest_level: bool,
    pub fallback_level_threshold: i64,
}

/// Unlocked goods whose level condition is met and whose purchase limit is
/// not used up.
pub fn purchasable_offers(goods: &[GoodsInfo], level: i64) -> Vec<SeedOffer> {
    goods
        .iter()
        .filter(|goods| goods.unlocked)
        .filter(|goods| goods.limit_count <= 0 || goods.bought_num < goods.limit_count)
        .filter_map(|goods| {
            let mut required_level = 0;
            for cond in goods.conds.iter().filter(|cond| cond.kind == COND_LEVEL) {
                if level < cond.param {
                    return None;
                }
                required_level = cond.param;
            }
            Some(SeedOffer {
                goods_id: goods.id,
                seed_id: goods.item_id,
                price: goods.price,
                required_level,
            })
        })
        .collect()
}

/// Picks a seed from `offers`.
///
/// Order of preference: forced lowest level, the recommender's exact seed,
/// any seed at the recommended level, then the level heuristic (lowest crop
/// up to the threshold, highest above it). Level ties go to the cheaper
/// seed.
pub fn choose_seed(
    offers: &[SeedOffer],
    level: i64,
    recommendation: Option<&SeedRecommendation>,
    policy: SeedPolicy,
) -> Option<(SeedOffer, SeedChoice)> {
    if offers.is_empty() {
        return None;
    }

    if policy.force_lowest_level {
        return lowest(offers).map(|offer| (offer, SeedChoice::ForcedLowest));
    }

    if let Some(rec) = recommendation {
        if let Some(offer) = offers.iter().find(|offer| offer.seed_id == rec.seed_id) {
            return Some((*offer, SeedChoice::Recommended));
        }
        if let Some(offer) = offers
            .iter()
            .find(|offer| offer.required_level == rec.required_level)
        {
            return Some((*offer, SeedChoice::RecommendedLevel));
        }
    }

    let offer = if level <= policy.fallback_level_threshold {
        lowest(offers)
    } else {
        highest(offers)
    };
    offer.map(|offer| (offer, SeedChoice::Fallback))
}

fn lowest(offers: &[SeedOffer]) -> Option<SeedOffer> {
    offers
        .iter()
        .min_by_key(|offer| (offer.required_level, offer.price))
        .copied()
}

fn highest(offers: &[SeedOffer]) -> Option<SeedOffer> {
    offers
        .iter()
        .max_by_key(|offer| (offer.required_level, Reverse(offer.price)))
        .copied()
}

/// How many of `wanted` plots can be seeded with `gold`.
pub fn affordable(wanted: usize, price: i64, gold: i64) -> usize {
    if price <= 0 {
        return wanted;
    }
    let can_buy = (gold.max(0) / price) as usize;
    wanted.min(can_buy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::shop::Cond;

    fn goods(id: i64, seed: i64, price: i64, level: i64) -> GoodsInfo {
        GoodsInfo {
            id,
            item_id: seed,
            price,
            unlocked: true,
            conds: vec![Cond {
                kind: COND_LEVEL,
                param: level,
            }],
            ..Default::default()
        }
    }

    fn offers() -> Vec<SeedOffer> {
        purchasable_offers(
            &[
                goods(1, 20002, 10, 1),
                goods(2, 20003, 40, 5),
                goods(3, 20004, 30, 5),
                goods(4, 20005, 200, 20),
            ],
            20,
        )
    }

    const POLICY: SeedPolicy = SeedPolicy {
        force_lowest_level: false,
        fallback_level_threshold: 28,
    };

    #[test]
    fn test_filters_locked_limited_and_high_level_goods() {
        let mut locked = goods(5, 1, 1, 1);
        locked.unlocked = false;
        let mut sold_out = goods(6, 2, 1, 1);
        sold_out.limit_count = 3;
        sold_out.bought_num = 3;
        let too_high = goods(7, 3, 1, 30);
        let fine = goods(8, 4, 1, 2);

        let offers = purchasable_offers(&[locked, sold_out, too_high, fine], 10);

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].goods_id, 8);
        assert_eq!(offers[0].required_level, 2);
    }

    #[test]
    fn test_recommendation_exact_then_level() {
        let exact = SeedRecommendation {
            seed_id: 20003,
            required_level: 5,
            name: "carrot".into(),
            exp_per_hour: 10.0,
        };
        let (offer, why) = choose_seed(&offers(), 20, Some(&exact), POLICY).unwrap();
        assert_eq!((offer.seed_id, why), (20003, SeedChoice::Recommended));

        let same_level = SeedRecommendation {
            seed_id: 99999,
            required_level: 20,
            ..exact
        };
        let (offer, why) = choose_seed(&offers(), 20, Some(&same_level), POLICY).unwrap();
        assert_eq!((offer.seed_id, why), (20005, SeedChoice::RecommendedLevel));
    }

    #[test]
    fn test_fallback_by_level_threshold() {
        let (low, _) = choose_seed(&offers(), 28, None, POLICY).unwrap();
        assert_eq!(low.seed_id, 20002);

        let (high, why) = choose_seed(&offers(), 29, None, POLICY).unwrap();
        assert_eq!(high.seed_id, 20005);
        assert_eq!(why, SeedChoice::Fallback);
    }

    #[test]
    fn test_forced_lowest_breaks_ties_on_price() {
        let offers = purchasable_offers(&[goods(2, 20003, 40, 5), goods(3, 20004, 30, 5)], 10);
        let policy = SeedPolicy {
            force_lowest_level: true,
            ..POLICY
        };

        let (offer, why) = choose_seed(&offers, 10, None, policy).unwrap();
        assert_eq!(offer.seed_id, 20004);
        assert_eq!(why, SeedChoice::ForcedLowest);
    }

    #[test]
    fn test_affordable_shrinks_to_budget() {
        assert_eq!(affordable(4, 10, 100), 4);
        assert_eq!(affordable(4, 30, 100), 3);
        assert_eq!(affordable(4, 30, 20), 0);
        assert_eq!(affordable(4, 0, 0), 4);
        assert_eq!(affordable(2, 10, -5), 0);
    }

    #[test]
    fn test_no_offers_no_choice() {
        assert!(choose_seed(&[], 10, None, POLICY).is_none());
    }
}
