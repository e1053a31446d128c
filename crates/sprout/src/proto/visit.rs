//! `gamepb.visitpb.VisitService`

use prost::Message;

use super::plant::LandInfo;
use super::user::BasicInfo;

pub const SERVICE: &str = "gamepb.visitpb.VisitService";

/// Enter reason for visiting a friend's farm.
pub const ENTER_REASON_FRIEND: i32 = 2;

#[derive(Clone, PartialEq, Message)]
pub struct EnterRequest {
    #[prost(int64, tag = "1")]
    pub host_gid: i64,
    #[prost(int32, tag = "2")]
    pub reason: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct EnterReply {
    #[prost(message, optional, tag = "1")]
    pub basic: Option<BasicInfo>,
    #[prost(message, repeated, tag = "2")]
    pub lands: Vec<LandInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LeaveRequest {
    #[prost(int64, tag = "1")]
    pub host_gid: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct LeaveReply {}
