// Domain layer: battle state, ranking rules and presentation-independent helpers.

pub mod errors;
pub mod gifts;
pub mod ranking;
pub mod snapshot;
pub mod timer;

pub use errors::{ProtocolError, TransportError};
pub use ranking::{RankedEntity, RankingProjector};
pub use snapshot::{BattleSnapshot, FinalRanking, LastGift, MessageKind, Scores};
pub use timer::{BattleClock, Urgency};
