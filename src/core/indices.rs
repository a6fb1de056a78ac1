use hashbrown::HashMap;

use crate::types::GameId;

/// Secondary index from a key to the games it owns, in creation order.
pub type GameIndex<K> = HashMap<K, Vec<GameId>>;
