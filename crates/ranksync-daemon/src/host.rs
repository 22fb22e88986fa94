use ranksync_sync::RanksApi;

/// Ranking capability of the standalone binary.
///
/// There is no game server behind it, so no player is ever connected and
/// every ban goes through the rank table.
pub struct StandaloneRanks {
    database_path: String,
    table: String,
}

impl StandaloneRanks {
    pub fn new(database_path: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            table: table.into(),
        }
    }
}

impl RanksApi for StandaloneRanks {
    fn database_path(&self) -> &str {
        &self.database_path
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn set_live_experience(&self, _id64: &str, _experience: i64) -> bool {
        false
    }

    fn connected_players(&self) -> Vec<String> {
        Vec::new()
    }
}
