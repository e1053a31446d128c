//! `gamepb.userpb.UserService`

use prost::Message;

pub const SERVICE: &str = "gamepb.userpb.UserService";

#[derive(Clone, PartialEq, Message)]
pub struct LoginRequest {
    #[prost(int64, tag = "1")]
    pub sharer_id: i64,
    #[prost(string, tag = "2")]
    pub sharer_open_id: String,
    #[prost(message, optional, tag = "3")]
    pub device_info: Option<DeviceInfo>,
    #[prost(int64, tag = "4")]
    pub share_cfg_id: i64,
    #[prost(string, tag = "5")]
    pub scene_id: String,
    #[prost(message, optional, tag = "6")]
    pub report_data: Option<ReportData>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DeviceInfo {
    #[prost(string, tag = "1")]
    pub client_version: String,
    #[prost(string, tag = "2")]
    pub sys_software: String,
    #[prost(string, tag = "3")]
    pub network: String,
    #[prost(int64, tag = "4")]
    pub memory: i64,
    #[prost(string, tag = "5")]
    pub device_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReportData {
    #[prost(string, tag = "1")]
    pub minigame_channel: String,
    #[prost(int32, tag = "2")]
    pub minigame_platid: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct LoginReply {
    #[prost(message, optional, tag = "1")]
    pub basic: Option<BasicInfo>,
    #[prost(int64, tag = "2")]
    pub time_now_millis: i64,
}

/// Account basics shared by login, visit and push payloads.
#[derive(Clone, PartialEq, Message)]
pub struct BasicInfo {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int64, tag = "3")]
    pub level: i64,
    #[prost(int64, tag = "4")]
    pub exp: i64,
    #[prost(int64, tag = "5")]
    pub gold: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct HeartbeatRequest {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub client_version: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct HeartbeatReply {
    /// Server wall clock in milliseconds.
    #[prost(int64, tag = "1")]
    pub server_time: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct BasicNotify {
    #[prost(message, optional, tag = "1")]
    pub basic: Option<BasicInfo>,
}
