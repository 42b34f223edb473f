//! Statistics output for the debriefing.

use tracing::{info, warn};
use traffic::{Exercise, ExerciseStats, ParticipantStats};

/// One line per participant, in participant order.
pub fn format_row(exercise: &Exercise, stats: &ParticipantStats) -> String {
    format!(
        "{:<20} sent={:>3} (B{} G{} I{}) received={:>3} dictation={:>2} letters={:>2} strength={}",
        exercise.station_name(&stats.participant),
        stats.sent,
        stats.broadcast,
        stats.group,
        stats.individual,
        stats.received,
        stats.dictation,
        stats.letters,
        stats.strength,
    )
}

pub fn log_stats(exercise: &Exercise) {
    let stats = ExerciseStats::collect(exercise);

    info!(
        messages = stats.total_messages,
        shuffle_attempts = stats.shuffle_attempts,
        dictation_replaced = stats.dictation_replaced,
        "Exercise statistics"
    );
    if !stats.adjacency_satisfied {
        warn!("Global order contains adjacent multi-recipient messages");
    }
    for participant in &stats.participants {
        info!("{}", format_row(exercise, participant));
    }
    for name in &exercise.letters.skipped {
        warn!(participant = %name, "Solution word not embedded, no eligible messages");
    }
}
