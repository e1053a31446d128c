//! `gamepb.itempb.ItemService`

use prost::Message;

pub const SERVICE: &str = "gamepb.itempb.ItemService";

/// Item id the server uses for gold in grant lists.
pub const GOLD_ITEM_ID: i64 = 1001;

#[derive(Clone, PartialEq, Message)]
pub struct Item {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub count: i64,
    #[prost(int64, tag = "3")]
    pub uid: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct BagRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct BagReply {
    #[prost(message, optional, tag = "1")]
    pub item_bag: Option<ItemBag>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ItemBag {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<Item>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SellRequest {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<Item>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SellReply {
    #[prost(message, repeated, tag = "1")]
    pub get_items: Vec<Item>,
}
