//! Game service payloads.
//!
//! Hand-derived prost messages for the subset of the game protocol the
//! client speaks. Field tags follow the gateway's captured schema; unknown
//! fields the server adds are skipped by prost on decode.

pub mod friend;
pub mod item;
pub mod plant;
pub mod shop;
pub mod task;
pub mod user;
pub mod visit;

pub use friend::{Application, FriendPlantSummary, GameFriend};
pub use item::Item;
pub use plant::{LandInfo, OperationLimit, PlantInfo, PlantPhaseInfo};
pub use shop::GoodsInfo;
pub use task::{Task, TaskInfo};
pub use user::BasicInfo;
