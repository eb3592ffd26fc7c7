use super::Store;
use crate::error::Result;

impl Store {
    /// Record that an authorized operator contacted the bot. Re-contact is
    /// the normal path: the existing row just gets the latest username.
    pub async fn upsert_bot_user(&self, telegram_id: i64, username: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO bot_users (telegram_id, username) VALUES (?1, ?2)
             ON CONFLICT(telegram_id) DO UPDATE SET username = excluded.username",
            rusqlite::params![telegram_id, username],
        )?;
        Ok(())
    }

    /// Telegram ids of everyone who has ever authenticated, for notification
    /// fan-out.
    pub async fn list_bot_users(&self) -> Result<Vec<i64>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT telegram_id FROM bot_users")?;

        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ids)
    }
}
