//! `gamepb.taskpb.TaskService`

use prost::Message;

use super::item::Item;

pub const SERVICE: &str = "gamepb.taskpb.TaskService";

#[derive(Clone, PartialEq, Message)]
pub struct TaskInfoRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct TaskInfoReply {
    #[prost(message, optional, tag = "1")]
    pub task_info: Option<TaskInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TaskInfo {
    #[prost(message, repeated, tag = "1")]
    pub growth_tasks: Vec<Task>,
    #[prost(message, repeated, tag = "2")]
    pub daily_tasks: Vec<Task>,
    #[prost(message, repeated, tag = "3")]
    pub tasks: Vec<Task>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Task {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub desc: String,
    #[prost(int64, tag = "3")]
    pub progress: i64,
    #[prost(int64, tag = "4")]
    pub total_progress: i64,
    #[prost(bool, tag = "5")]
    pub is_unlocked: bool,
    #[prost(bool, tag = "6")]
    pub is_claimed: bool,
    #[prost(int64, tag = "7")]
    pub share_multiple: i64,
    #[prost(int32, tag = "8")]
    pub task_type: i32,
    #[prost(message, repeated, tag = "9")]
    pub rewards: Vec<Item>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClaimTaskRewardRequest {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(bool, tag = "2")]
    pub do_shared: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClaimTaskRewardReply {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<Item>,
    #[prost(message, optional, tag = "2")]
    pub task_info: Option<TaskInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TaskInfoNotify {
    #[prost(message, optional, tag = "1")]
    pub task_info: Option<TaskInfo>,
}
