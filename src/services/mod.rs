pub(crate) mod ai_review;
pub(crate) mod attempts;
pub(crate) mod errors;
pub(crate) mod evaluation;
pub(crate) mod leaderboard;
pub(crate) mod scoring;
pub(crate) mod stats;
