use super::OptionalExt;
use crate::Database;
use anyhow::Result;
use rusqlite::TransactionBehavior;
use rounds_types::models::{VotableType, VoteOutcome, VoteType};

impl Database {
    // -- Votes --

    /// Applies one vote action as a single transaction over the ledger:
    /// no prior row inserts, a repeat of the same direction deletes, and
    /// the opposite direction flips the row in place (same id, same
    /// created_at). Returns None when the votable row does not exist.
    ///
    /// The UNIQUE(user_id, votable_id, votable_type) constraint backstops
    /// the check-then-insert against concurrent casts of the same vote.
    pub fn cast_vote(
        &self,
        vote_id: &str,
        user_id: &str,
        votable_id: &str,
        votable_type: VotableType,
        vote_type: VoteType,
    ) -> Result<Option<VoteOutcome>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let target_sql = match votable_type {
                VotableType::Post => "SELECT 1 FROM posts WHERE id = ?1",
                VotableType::Comment => "SELECT 1 FROM comments WHERE id = ?1",
            };
            let target_exists: Option<i64> = tx
                .query_row(target_sql, [votable_id], |row| row.get(0))
                .optional()?;
            if target_exists.is_none() {
                return Ok(None);
            }

            // At most one row can match thanks to the unique constraint.
            let existing: Option<(String, String)> = tx
                .query_row(
                    "SELECT id, vote_type FROM votes
                     WHERE user_id = ?1 AND votable_id = ?2 AND votable_type = ?3",
                    rusqlite::params![user_id, votable_id, votable_type.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let outcome = match existing {
                None => {
                    tx.execute(
                        "INSERT INTO votes (id, votable_id, votable_type, user_id, vote_type)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        rusqlite::params![
                            vote_id,
                            votable_id,
                            votable_type.as_str(),
                            user_id,
                            vote_type.as_str()
                        ],
                    )?;
                    VoteOutcome::Created
                }
                Some((existing_id, existing_type)) if existing_type == vote_type.as_str() => {
                    tx.execute("DELETE FROM votes WHERE id = ?1", [&existing_id])?;
                    VoteOutcome::Removed
                }
                Some((existing_id, _)) => {
                    tx.execute(
                        "UPDATE votes SET vote_type = ?1 WHERE id = ?2",
                        rusqlite::params![vote_type.as_str(), existing_id],
                    )?;
                    VoteOutcome::Switched
                }
            };

            tx.commit()?;
            Ok(Some(outcome))
        })
    }

    /// Net score for one votable: +1 per upvote, -1 per downvote.
    pub fn score(&self, votable_id: &str, votable_type: VotableType) -> Result<i64> {
        self.with_conn(|conn| {
            let score = conn.query_row(
                "SELECT COALESCE(SUM(CASE vote_type WHEN 'upvote' THEN 1 ELSE -1 END), 0)
                 FROM votes WHERE votable_id = ?1 AND votable_type = ?2",
                rusqlite::params![votable_id, votable_type.as_str()],
                |row| row.get(0),
            )?;
            Ok(score)
        })
    }
}
