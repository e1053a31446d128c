//! `gamepb.friendpb.FriendService`

use prost::Message;

pub const SERVICE: &str = "gamepb.friendpb.FriendService";

#[derive(Clone, PartialEq, Message)]
pub struct GetAllRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct GetAllReply {
    #[prost(message, repeated, tag = "1")]
    pub game_friends: Vec<GameFriend>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GameFriend {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, optional, tag = "3")]
    pub plant: Option<FriendPlantSummary>,
}

/// Per-friend counts the server reports in the friend list.
#[derive(Clone, PartialEq, Message)]
pub struct FriendPlantSummary {
    #[prost(int64, tag = "1")]
    pub steal_plant_num: i64,
    #[prost(int64, tag = "2")]
    pub dry_num: i64,
    #[prost(int64, tag = "3")]
    pub weed_num: i64,
    #[prost(int64, tag = "4")]
    pub insect_num: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetApplicationsRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct GetApplicationsReply {
    #[prost(message, repeated, tag = "1")]
    pub applications: Vec<Application>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Application {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct AcceptFriendsRequest {
    #[prost(int64, repeated, tag = "1")]
    pub friend_gids: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AcceptFriendsReply {
    #[prost(message, repeated, tag = "1")]
    pub friends: Vec<GameFriend>,
}
