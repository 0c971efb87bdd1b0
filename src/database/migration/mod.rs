pub use sea_orm_migration::prelude::*;

mod m20250114_090211_games_table;
mod m20250114_091502_players_table;
mod m20250114_092247_clans_table;
mod m20250114_093128_memberships_table;
mod m20250116_104833_hooks_table;
mod m20250223_081654_hook_outbox_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250114_090211_games_table::Migration),
            Box::new(m20250114_091502_players_table::Migration),
            Box::new(m20250114_092247_clans_table::Migration),
            Box::new(m20250114_093128_memberships_table::Migration),
            Box::new(m20250116_104833_hooks_table::Migration),
            Box::new(m20250223_081654_hook_outbox_table::Migration),
        ]
    }
}
