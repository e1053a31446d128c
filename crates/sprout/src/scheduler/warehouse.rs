//! Periodic fruit selling.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::guard::CycleGuard;
use super::pause;
use crate::catalog::GameData;
use crate::client::GameClient;
use crate::config::WarehouseConfig;
use crate::error::Result;
use crate::proto::item::{Item, GOLD_ITEM_ID};

/// Bag items the catalog knows as fruit, with something to sell.
pub fn fruits_to_sell(items: &[Item], game_data: &dyn GameData) -> Vec<Item> {
    items
        .iter()
        .filter(|item| item.count > 0 && game_data.is_fruit(item.id))
        .cloned()
        .collect()
}

pub struct WarehouseOrchestrator {
    client: GameClient,
    game_data: Arc<dyn GameData>,
    config: WarehouseConfig,
    guard: CycleGuard,
}

impl WarehouseOrchestrator {
    pub fn new(
        client: GameClient,
        game_data: Arc<dyn GameData>,
        config: WarehouseConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            game_data,
            config,
            guard: CycleGuard::new(),
        })
    }

    /// Sells every fruit in the bag in one call.
    ///
    /// Returns the gold received, or `None` when nothing was sold or a
    /// check is already running.
    pub async fn sell_fruits(&self) -> Result<Option<i64>> {
        let Some(_ticket) = self.guard.try_enter() else {
            return Ok(None);
        };
        let bag = self.client.bag().await?;
        let fruits = fruits_to_sell(&bag, self.game_data.as_ref());
        if fruits.is_empty() {
            return Ok(None);
        }

        let names: Vec<String> = fruits
            .iter()
            .map(|item| format!("{} x{}", self.game_data.fruit_name(item.id), item.count))
            .collect();
        let reply = self.client.sell(fruits).await?;
        let gold = reply
            .get_items
            .iter()
            .find(|item| item.id == GOLD_ITEM_ID)
            .map(|item| item.count)
            .unwrap_or(0);

        info!(target: "sprout::warehouse", sold = ?names, gold, "sold fruit");
        Ok(Some(gold))
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        if pause(&shutdown, self.config.start_delay).await {
            loop {
                if let Err(err) = self.sell_fruits().await {
                    warn!(target: "sprout::warehouse", error = %err, "selling failed");
                }
                if !pause(&shutdown, self.config.interval).await {
                    break;
                }
            }
        }
        info!(target: "sprout::warehouse", "warehouse loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn item(id: i64, count: i64) -> Item {
        Item { id, count, uid: 0 }
    }

    #[test]
    fn test_only_stocked_fruit_is_sold() {
        let catalog = Catalog::from_json(
            r#"{"plants": [{"id": 1020002, "name": "radish", "seed_id": 20002,
                "fruit": {"id": 40002, "count": 10, "name": "radish"}}]}"#,
        )
        .unwrap();
        let bag = [item(40_002, 6), item(20_002, 4), item(40_002, 0), item(1001, 900)];

        let fruits = fruits_to_sell(&bag, &catalog);

        assert_eq!(fruits, vec![item(40_002, 6)]);
    }
}
