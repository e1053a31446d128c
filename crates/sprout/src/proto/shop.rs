//! `gamepb.shoppb.ShopService`

use prost::Message;

use super::item::Item;

pub const SERVICE: &str = "gamepb.shoppb.ShopService";

/// Condition type for a minimum player level.
pub const COND_LEVEL: i32 = 1;

#[derive(Clone, PartialEq, Message)]
pub struct ShopInfoRequest {
    #[prost(int64, tag = "1")]
    pub shop_id: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ShopInfoReply {
    #[prost(message, repeated, tag = "1")]
    pub goods_list: Vec<GoodsInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GoodsInfo {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub item_id: i64,
    #[prost(int64, tag = "3")]
    pub price: i64,
    #[prost(bool, tag = "4")]
    pub unlocked: bool,
    #[prost(message, repeated, tag = "5")]
    pub conds: Vec<Cond>,
    #[prost(int64, tag = "6")]
    pub limit_count: i64,
    #[prost(int64, tag = "7")]
    pub bought_num: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Cond {
    #[prost(int32, tag = "1")]
    pub kind: i32,
    #[prost(int64, tag = "2")]
    pub param: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct BuyGoodsRequest {
    #[prost(int64, tag = "1")]
    pub goods_id: i64,
    #[prost(int64, tag = "2")]
    pub num: i64,
    #[prost(int64, tag = "3")]
    pub price: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct BuyGoodsReply {
    #[prost(message, repeated, tag = "1")]
    pub get_items: Vec<Item>,
}
