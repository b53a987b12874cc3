//! Tallying: per-candidate counts, percentages, rank with ties, turnout.
//!
//! Everything is recomputed from the vote rows on every read.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::{
    CandidateVoteCount, DbPool, InvitedVoter, Position, SessionMode, Vote, VotingSession,
};

/// A candidate with its standing within its position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub display_order: i64,
    pub vote_count: i64,
    /// Share of the position's votes, one decimal place
    pub percentage: f64,
    pub rank: u32,
    /// Shares a nonzero count with at least one other candidate
    pub is_tied: bool,
    /// Sole holder of rank 1 with at least one vote
    pub is_leading: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionStanding {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub max_selections: i64,
    pub display_order: i64,
    /// Sum of the candidates' counts
    pub total_votes: i64,
    pub candidates: Vec<RankedCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Distinct ballots cast in the session
    pub total_votes: i64,
    pub total_invited: i64,
    pub turnout_percentage: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SessionTally {
    pub positions: Vec<PositionStanding>,
    /// Raw counts per position id, in display order
    pub counts: HashMap<String, Vec<CandidateVoteCount>>,
    pub stats: SessionStats,
}

/// `count` as a percentage of `total`, rounded to one decimal; 0 when there
/// are no votes at all
pub fn percentage(count: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let raw = count as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

/// Ballots cast over invitations, rounded to a whole percent. Only official
/// sessions with at least one invitation have a turnout.
pub fn turnout_percentage(mode: SessionMode, total_votes: i64, total_invited: i64) -> Option<i64> {
    if mode != SessionMode::Official || total_invited <= 0 {
        return None;
    }
    Some((total_votes as f64 / total_invited as f64 * 100.0).round() as i64)
}

/// Order candidates by votes (display order breaks ties) and annotate each
/// with its percentage, rank and tie/leading flags.
///
/// Ranks are dense: equal counts share a rank and the next lower count takes
/// the next integer, so counts [5, 5, 3, 0] rank [1, 1, 2, 3].
pub fn rank_candidates(mut candidates: Vec<CandidateVoteCount>) -> Vec<RankedCandidate> {
    candidates.sort_by(|a, b| {
        b.vote_count
            .cmp(&a.vote_count)
            .then(a.display_order.cmp(&b.display_order))
    });

    let total: i64 = candidates.iter().map(|c| c.vote_count).sum();
    let counts: Vec<i64> = candidates.iter().map(|c| c.vote_count).collect();

    let mut rank = 0u32;
    let mut previous: Option<i64> = None;

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| {
            let count = candidate.vote_count;
            if previous != Some(count) {
                rank += 1;
                previous = Some(count);
            }

            // Sorted, so equal counts are neighbours
            let shares_count = (i > 0 && counts[i - 1] == count)
                || counts.get(i + 1).is_some_and(|next| *next == count);
            let is_tied = count > 0 && shares_count;

            RankedCandidate {
                id: candidate.id,
                name: candidate.name,
                description: candidate.description,
                photo_url: candidate.photo_url,
                display_order: candidate.display_order,
                vote_count: count,
                percentage: percentage(count, total),
                rank,
                is_tied,
                is_leading: rank == 1 && count > 0 && !is_tied,
            }
        })
        .collect()
}

/// Build the standing of one position from its candidates' counts
pub fn position_standing(position: &Position, counts: Vec<CandidateVoteCount>) -> PositionStanding {
    let total_votes = counts.iter().map(|c| c.vote_count).sum();
    PositionStanding {
        id: position.id.clone(),
        title: position.title.clone(),
        description: position.description.clone(),
        max_selections: position.max_selections,
        display_order: position.display_order,
        total_votes,
        candidates: rank_candidates(counts),
    }
}

/// Session-level ballot and turnout numbers
pub async fn session_stats(db: &DbPool, session: &VotingSession) -> Result<SessionStats, sqlx::Error> {
    let mode = session.mode_enum();
    let total_votes = Vote::count_voters(db, &session.id).await?;
    let total_invited = if mode == SessionMode::Official {
        InvitedVoter::count_for_session(db, &session.id).await?
    } else {
        0
    };

    Ok(SessionStats {
        total_votes,
        total_invited,
        turnout_percentage: turnout_percentage(mode, total_votes, total_invited),
    })
}

/// Tally every position of a session
pub async fn tally_session(db: &DbPool, session: &VotingSession) -> Result<SessionTally, sqlx::Error> {
    let positions = Position::list_for_session(db, &session.id).await?;

    let mut counts: HashMap<String, Vec<CandidateVoteCount>> = HashMap::new();
    for row in CandidateVoteCount::list_for_session(db, &session.id).await? {
        counts.entry(row.position_id.clone()).or_default().push(row);
    }

    let standings = positions
        .iter()
        .map(|position| {
            let rows = counts.get(&position.id).cloned().unwrap_or_default();
            position_standing(position, rows)
        })
        .collect();

    let stats = session_stats(db, session).await?;

    Ok(SessionTally {
        positions: standings,
        counts,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counted(id: &str, display_order: i64, vote_count: i64) -> CandidateVoteCount {
        CandidateVoteCount {
            id: id.to_string(),
            position_id: "p1".to_string(),
            name: id.to_uppercase(),
            description: None,
            photo_url: None,
            display_order,
            vote_count,
        }
    }

    #[test]
    fn test_ranks_with_ties() {
        let ranked = rank_candidates(vec![
            counted("c", 0, 3),
            counted("a", 1, 5),
            counted("d", 2, 0),
            counted("b", 3, 5),
        ]);

        let ranks: Vec<u32> = ranked.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![1, 1, 2, 3]);

        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);

        assert!(ranked[0].is_tied && ranked[1].is_tied);
        assert!(!ranked[2].is_tied && !ranked[3].is_tied);
        assert!(ranked.iter().all(|c| !c.is_leading));
    }

    #[test]
    fn test_single_leader() {
        let ranked = rank_candidates(vec![counted("a", 0, 2), counted("b", 1, 7)]);
        assert_eq!(ranked[0].id, "b");
        assert!(ranked[0].is_leading);
        assert!(!ranked[1].is_leading);
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn test_zero_votes_never_leading_or_tied() {
        let ranked = rank_candidates(vec![counted("a", 0, 0), counted("b", 1, 0)]);
        assert!(ranked.iter().all(|c| c.rank == 1));
        assert!(ranked.iter().all(|c| !c.is_tied && !c.is_leading));
        assert!(ranked.iter().all(|c| c.percentage == 0.0));
        // Display order decides among equals
        assert_eq!(ranked[0].id, "a");
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let ranked = rank_candidates(vec![
            counted("a", 0, 1),
            counted("b", 1, 1),
            counted("c", 2, 1),
        ]);
        let sum: f64 = ranked.iter().map(|c| c.percentage).sum();
        assert!((sum - 100.0).abs() <= 0.15, "sum was {}", sum);
        assert_eq!(ranked[0].percentage, 33.3);
    }

    #[test]
    fn test_percentage_edge_cases() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(3, 4), 75.0);
        assert_eq!(percentage(2, 3), 66.7);
    }

    #[test]
    fn test_turnout() {
        assert_eq!(turnout_percentage(SessionMode::Official, 3, 4), Some(75));
        assert_eq!(turnout_percentage(SessionMode::Official, 0, 0), None);
        assert_eq!(turnout_percentage(SessionMode::Official, 1, 3), Some(33));
        assert_eq!(turnout_percentage(SessionMode::Casual, 3, 4), None);
    }

    #[test]
    fn test_position_standing_total() {
        let position = Position {
            id: "p1".to_string(),
            session_id: "s1".to_string(),
            title: "President".to_string(),
            description: None,
            max_selections: 1,
            display_order: 0,
        };
        let standing = position_standing(&position, vec![counted("a", 0, 4), counted("b", 1, 1)]);
        assert_eq!(standing.total_votes, 5);
        assert_eq!(standing.candidates[0].percentage, 80.0);
    }
}
