pub mod album;
pub mod artist;
pub mod download;
pub mod listening_event;
pub mod preference;
pub mod quality_profile;
pub mod recommendation;
pub mod rule;
pub mod setting;
pub mod taste_profile;
pub mod track;
pub mod user;
pub mod wishlist;

pub use album::*;
pub use artist::*;
pub use download::*;
pub use listening_event::*;
pub use preference::*;
pub use quality_profile::*;
pub use recommendation::*;
pub use rule::*;
pub use setting::*;
pub use taste_profile::*;
pub use track::*;
pub use user::*;
pub use wishlist::*;
