//! `gamepb.plantpb.PlantService`

use prost::Message;

pub const SERVICE: &str = "gamepb.plantpb.PlantService";

#[derive(Clone, PartialEq, Message)]
pub struct LandInfo {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(bool, tag = "2")]
    pub unlocked: bool,
    #[prost(message, optional, tag = "3")]
    pub plant: Option<PlantInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PlantInfo {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, repeated, tag = "3")]
    pub phases: Vec<PlantPhaseInfo>,
    #[prost(int64, tag = "4")]
    pub dry_num: i64,
    #[prost(int64, repeated, tag = "5")]
    pub weed_owners: Vec<i64>,
    #[prost(int64, repeated, tag = "6")]
    pub insect_owners: Vec<i64>,
    #[prost(bool, tag = "7")]
    pub stealable: bool,
    #[prost(int64, tag = "8")]
    pub left_fruit_num: i64,
}

/// One growth stage. Timestamps are seconds or milliseconds since the
/// epoch; zero means unset.
#[derive(Clone, PartialEq, Message)]
pub struct PlantPhaseInfo {
    #[prost(int32, tag = "1")]
    pub phase: i32,
    #[prost(int64, tag = "2")]
    pub begin_time: i64,
    #[prost(int64, tag = "3")]
    pub dry_time: i64,
    #[prost(int64, tag = "4")]
    pub weeds_time: i64,
    #[prost(int64, tag = "5")]
    pub insect_time: i64,
}

/// Server-side daily counters for one operation kind.
#[derive(Clone, PartialEq, Message)]
pub struct OperationLimit {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub day_times: i64,
    #[prost(int64, tag = "3")]
    pub day_times_lt: i64,
    #[prost(int64, tag = "4")]
    pub day_exp_times: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct AllLandsRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct AllLandsReply {
    #[prost(message, repeated, tag = "1")]
    pub lands: Vec<LandInfo>,
    #[prost(message, repeated, tag = "2")]
    pub operation_limits: Vec<OperationLimit>,
}

#[derive(Clone, PartialEq, Message)]
pub struct HarvestRequest {
    #[prost(int64, repeated, tag = "1")]
    pub land_ids: Vec<i64>,
    #[prost(int64, tag = "2")]
    pub host_gid: i64,
    #[prost(bool, tag = "3")]
    pub is_all: bool,
}

/// Request shape shared by water, weed, insect and put-* actions.
#[derive(Clone, PartialEq, Message)]
pub struct LandActionRequest {
    #[prost(int64, repeated, tag = "1")]
    pub land_ids: Vec<i64>,
    #[prost(int64, tag = "2")]
    pub host_gid: i64,
}

/// Reply shape shared by every land action.
#[derive(Clone, PartialEq, Message)]
pub struct LandActionReply {
    #[prost(message, repeated, tag = "1")]
    pub land: Vec<LandInfo>,
    #[prost(message, repeated, tag = "2")]
    pub operation_limits: Vec<OperationLimit>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FertilizeRequest {
    #[prost(int64, repeated, tag = "1")]
    pub land_ids: Vec<i64>,
    #[prost(int64, tag = "2")]
    pub fertilizer_id: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct RemovePlantRequest {
    #[prost(int64, repeated, tag = "1")]
    pub land_ids: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PlantRequest {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<PlantItem>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PlantItem {
    #[prost(int64, tag = "1")]
    pub seed_id: i64,
    #[prost(int64, repeated, tag = "2")]
    pub land_ids: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LandsNotify {
    #[prost(message, repeated, tag = "1")]
    pub lands: Vec<LandInfo>,
    #[prost(int64, tag = "2")]
    pub host_gid: i64,
}
