/// The ranking system this service plugs into.
///
/// It owns the rank table and the in-memory experience of connected players.
/// Absence of an implementation at startup leaves the service
/// [`NotReady`](crate::SyncService::NotReady).
pub trait RanksApi: Send + Sync {
    /// SQLite path of the rank database.
    fn database_path(&self) -> &str;

    fn table_name(&self) -> &str;

    /// Overwrite the live experience of a connected player.
    ///
    /// Returns `false` when no player with that 64-bit id is connected, in
    /// which case the caller must write the store instead.
    fn set_live_experience(&self, id64: &str, experience: i64) -> bool;

    /// 64-bit ids of every connected (non-bot) player.
    fn connected_players(&self) -> Vec<String>;
}
